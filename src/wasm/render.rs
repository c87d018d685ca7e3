use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{window, HtmlCanvasElement};

use super::App;

/// Matches the drawing buffer to the canvas' layout size.
pub fn fit_canvas(canvas: &HtmlCanvasElement) {
    let width = canvas.client_width().max(1) as u32;
    let height = canvas.client_height().max(1) as u32;
    if canvas.width() != width || canvas.height() != height {
        canvas.set_width(width);
        canvas.set_height(height);
    }
}

/// Starts the resize handler and the animation-frame loop.
pub(super) fn start(app: &Rc<RefCell<App>>) -> Result<(), JsValue> {
    let window = window().ok_or("no window")?;

    let resize_closure = {
        let app = Rc::downgrade(app);
        Closure::wrap(Box::new(move || {
            let Some(app) = app.upgrade() else {
                return;
            };
            let Ok(app) = app.try_borrow() else {
                return;
            };
            for id in app.pool().visualizer_ids() {
                if let Some(visualizer) = app.pool().get_visualizer(id) {
                    fit_canvas(visualizer.canvas().element());
                }
            }
        }) as Box<dyn FnMut()>)
    };
    window.add_event_listener_with_callback("resize", resize_closure.as_ref().unchecked_ref())?;
    resize_closure.forget();

    // `f` holds the frame closure so it can reschedule itself. It is created
    // empty first and filled once the closure exists.
    let f: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let g = f.clone();
    let app = app.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        if let Ok(mut app) = app.try_borrow_mut() {
            if let Err(e) = app.frame() {
                log::error!("Frame failed: {:?}", e);
            }
        }

        let scheduled = match (web_sys::window(), f.borrow().as_ref()) {
            (Some(window), Some(frame)) => window.request_animation_frame(frame.as_ref().unchecked_ref()).is_ok(),
            _ => false,
        };
        if !scheduled {
            log::error!("Render loop stopped: requestAnimationFrame unavailable");
        }
    }) as Box<dyn FnMut()>));

    if let Some(frame) = g.borrow().as_ref() {
        window.request_animation_frame(frame.as_ref().unchecked_ref())?;
    }
    Ok(())
}
