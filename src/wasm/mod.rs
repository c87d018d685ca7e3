//! Browser entry points.

mod dom;
mod render;
mod webgl;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, KeyboardEvent, TouchEvent, WheelEvent};

use crate::bus::{Event, EventBus, Mailbox, Topic};
use crate::clock::Clock;
use crate::config::{parse_json, BehaviorConfig, StateMapConfig, VisualsConfig};
use crate::geometry::{GeometryRegistry, MemoryShaderLoader};
use crate::interaction::{DomEvent, InteractionCoordinator};
use crate::navigation::gesture::{SwipeTracker, WheelDebouncer};
use crate::navigation::{HomeMaster, NavigationSnapshot};
use crate::pool::{PoolOptions, VisualizerPool};

pub use dom::{DomScene, THEME_ATTRIBUTE};
pub use webgl::{WebCanvas, WebGl};

/// Canvas id of the full-page visualizer that follows the section background.
pub const BACKGROUND_CANVAS_ID: &str = "background-canvas";

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    // `start` and `HyperApp::boot` both run this; only the first installs a logger.
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("Console logger already installed");
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    init_panic_hook();
}

/// `performance.now()`, or zero when the page has no performance object.
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            performance: web_sys::window().and_then(|w| w.performance()),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        self.performance.as_ref().map_or(0.0, |p| p.now())
    }
}

pub(crate) struct App {
    pool: VisualizerPool<WebCanvas>,
    coordinator: InteractionCoordinator,
    master: HomeMaster,
    scene: DomScene,
    ui_events: Mailbox,
    wheel: WheelDebouncer,
    swipe: SwipeTracker,
    clock: Rc<PerformanceClock>,
}

impl App {
    /// One animation frame: navigation, delayed reactions, rendering, DOM sync.
    pub(crate) fn frame(&mut self) -> Result<(), JsValue> {
        let now = self.clock.now_ms();
        if let Some(delta) = self.wheel.poll(now) {
            self.master.handle_wheel(delta);
        }
        self.master.poll();
        self.coordinator.poll(&mut self.scene.graph);
        self.pool.tick(now);

        let dirty = self.coordinator.take_dirty();
        self.scene.sync_styles(&dirty)?;
        self.sync_ui()
    }

    fn sync_ui(&mut self) -> Result<(), JsValue> {
        for event in self.ui_events.drain() {
            match event {
                Event::ActiveCardsChanged { active_cards } => self.scene.apply_active_cards(&active_cards)?,
                Event::ThemeChanged { theme } => self.scene.apply_theme(&theme)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn pool(&self) -> &VisualizerPool<WebCanvas> {
        &self.pool
    }
}

/// Handle returned to the page script.
#[wasm_bindgen]
pub struct HyperApp {
    app: Rc<RefCell<App>>,
}

#[wasm_bindgen]
impl HyperApp {
    /// Builds every subsystem from the three JSON documents plus a
    /// `{ "path": "source" }` map of prefetched shader files, then starts
    /// the render loop.
    pub fn boot(
        visuals_json: &str,
        behavior_json: &str,
        states_json: &str,
        shader_files_json: &str,
    ) -> Result<HyperApp, JsValue> {
        init_panic_hook();
        let visuals: VisualsConfig = parse_json("visuals", visuals_json).map_err(to_js)?;
        let behavior: BehaviorConfig = parse_json("behavior", behavior_json).map_err(to_js)?;
        let states: StateMapConfig = parse_json("states", states_json).map_err(to_js)?;
        let shader_files: HashMap<String, String> = parse_json("shader files", shader_files_json).map_err(to_js)?;

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        let bus = EventBus::new();
        let clock = Rc::new(PerformanceClock::new());
        let registry = Rc::new(
            GeometryRegistry::initialize(&visuals, &MemoryShaderLoader::new(shader_files), &bus).map_err(to_js)?,
        );

        let options = PoolOptions {
            background_visualizer: Some(BACKGROUND_CANVAS_ID.to_string()),
            ..PoolOptions::default()
        };
        let mut pool = VisualizerPool::new(registry, bus.clone(), options);

        let canvases = document.query_selector_all("canvas[data-geometry]")?;
        for index in 0..canvases.length() {
            let Some(canvas) = canvases.item(index).and_then(|n| n.dyn_into::<HtmlCanvasElement>().ok()) else {
                continue;
            };
            let geometry = canvas.get_attribute("data-geometry").unwrap_or_default();
            render::fit_canvas(&canvas);
            match pool.create_visualizer(WebCanvas::new(canvas.clone()), &geometry, BTreeMap::new()) {
                Ok(id) => {
                    if canvas.id().is_empty() {
                        canvas.set_id(&id);
                    }
                }
                Err(e) => log::error!("Visualizer for geometry '{}' failed: {}", geometry, e),
            }
        }

        let mut scene = DomScene::from_document(&document)?;
        let coordinator = InteractionCoordinator::new(bus.clone(), clock.clone(), &behavior);
        let bound = coordinator.bind(&mut scene.graph);
        scene.tag_blueprints()?;
        log::info!("Bound blueprints to {} elements", bound);

        let ui_events = bus.mailbox(&[Topic::ActiveCardsChanged, Topic::ThemeChanged]);
        let master = HomeMaster::new(states, bus, clock.clone()).map_err(to_js)?;
        scene.apply_active_cards(master.active_cards())?;
        scene.apply_theme(master.current_theme())?;
        ui_events.drain();

        pool.start(clock.now_ms());
        let app = Rc::new(RefCell::new(App {
            pool,
            coordinator,
            master,
            scene,
            ui_events,
            wheel: WheelDebouncer::default(),
            swipe: SwipeTracker::default(),
            clock,
        }));

        attach_element_listeners(&app)?;
        attach_navigation_listeners(&app, &document)?;
        render::start(&app)?;
        log::info!("HyperApp booted");
        Ok(HyperApp { app })
    }

    #[wasm_bindgen(js_name = navigateTo)]
    pub fn navigate_to(&self, state: &str) -> bool {
        self.app.borrow_mut().master.navigate_to(state)
    }

    #[wasm_bindgen(js_name = currentState)]
    pub fn current_state(&self) -> String {
        self.app.borrow().master.current_state().to_string()
    }

    #[wasm_bindgen(js_name = visualizerCount)]
    pub fn visualizer_count(&self) -> usize {
        self.app.borrow().pool.visualizer_count()
    }

    #[wasm_bindgen(js_name = exportState)]
    pub fn export_state(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.app.borrow().master.export_state()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = restoreState)]
    pub fn restore_state(&self, snapshot_json: &str) -> Result<bool, JsValue> {
        let snapshot: NavigationSnapshot = parse_json("snapshot", snapshot_json).map_err(to_js)?;
        Ok(self.app.borrow_mut().master.restore_state(snapshot))
    }
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

// Listeners hold weak handles; a listener firing while a frame holds the
// app borrow is dropped.
fn with_app(app: &Weak<RefCell<App>>, f: impl FnOnce(&mut App)) {
    if let Some(app) = app.upgrade() {
        if let Ok(mut app) = app.try_borrow_mut() {
            f(&mut *app);
        }
    }
}

fn attach_element_listeners(app: &Rc<RefCell<App>>) -> Result<(), JsValue> {
    let targets = {
        let app = app.borrow();
        app.scene
            .interactive()
            .into_iter()
            .map(|(id, node)| (id, node, app.coordinator.listened_events(&app.scene.graph, id)))
            .collect::<Vec<_>>()
    };
    for (element, node, events) in targets {
        for event in events {
            let weak = Rc::downgrade(app);
            let closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
                with_app(&weak, |app| {
                    app.coordinator.dispatch(&mut app.scene.graph, element, event);
                });
            }) as Box<dyn FnMut(web_sys::Event)>);
            node.add_event_listener_with_callback(event.as_str(), closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
    }
    Ok(())
}

fn attach_navigation_listeners(app: &Rc<RefCell<App>>, document: &web_sys::Document) -> Result<(), JsValue> {
    let weak = Rc::downgrade(app);
    let keydown = Closure::wrap(Box::new(move |event: KeyboardEvent| {
        with_app(&weak, |app| {
            if app.master.handle_key(&event.key()) {
                event.prevent_default();
            }
        });
    }) as Box<dyn FnMut(KeyboardEvent)>);
    document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
    keydown.forget();

    let weak = Rc::downgrade(app);
    let wheel = Closure::wrap(Box::new(move |event: WheelEvent| {
        with_app(&weak, |app| {
            let now = app.clock.now_ms();
            app.wheel.push(event.delta_y(), now);
        });
    }) as Box<dyn FnMut(WheelEvent)>);
    document.add_event_listener_with_callback("wheel", wheel.as_ref().unchecked_ref())?;
    wheel.forget();

    let weak = Rc::downgrade(app);
    let touch_start = Closure::wrap(Box::new(move |event: TouchEvent| {
        let Some(touch) = event.touches().get(0) else {
            return;
        };
        with_app(&weak, |app| {
            let now = app.clock.now_ms();
            app.swipe.begin(f64::from(touch.client_x()), now);
        });
    }) as Box<dyn FnMut(TouchEvent)>);
    document.add_event_listener_with_callback("touchstart", touch_start.as_ref().unchecked_ref())?;
    touch_start.forget();

    let weak = Rc::downgrade(app);
    let touch_end = Closure::wrap(Box::new(move |event: TouchEvent| {
        let Some(touch) = event.changed_touches().get(0) else {
            return;
        };
        with_app(&weak, |app| {
            let now = app.clock.now_ms();
            if let Some(step) = app.swipe.end(f64::from(touch.client_x()), now) {
                app.master.handle_swipe(step);
            }
        });
    }) as Box<dyn FnMut(TouchEvent)>);
    document.add_event_listener_with_callback("touchend", touch_end.as_ref().unchecked_ref())?;
    touch_end.forget();

    Ok(())
}
