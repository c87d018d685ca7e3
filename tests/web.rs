#![cfg(target_arch = "wasm32")]

use std::collections::BTreeMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

use hyperviz_wasm::bus::EventBus;
use hyperviz_wasm::geometry::GeometryRegistry;
use hyperviz_wasm::pool::{PoolOptions, VisualizerPool};
use hyperviz_wasm::value::UniformValue;
use hyperviz_wasm::wasm::{init_panic_hook, HyperApp, WebCanvas};

wasm_bindgen_test_configure!(run_in_browser);

fn canvas(id: &str, geometry: &str) -> web_sys::HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas: web_sys::HtmlCanvasElement = document.create_element("canvas").unwrap().dyn_into().unwrap();
    canvas.set_id(id);
    canvas.set_width(64);
    canvas.set_height(64);
    canvas.set_attribute("data-geometry", geometry).unwrap();
    document.body().unwrap().append_child(&canvas).unwrap();
    canvas
}

fn webgl_available(canvas: &web_sys::HtmlCanvasElement) -> bool {
    matches!(canvas.get_context("webgl"), Ok(Some(_)))
}

#[wasm_bindgen_test]
fn repeated_initialisation_keeps_the_logger() {
    init_panic_hook();
    init_panic_hook();
    assert_eq!(log::max_level(), log::LevelFilter::Info);
}

#[wasm_bindgen_test]
fn webgl_visualizer_renders_all_contract_uniforms() {
    let element = canvas("web-pool", "hypercube");
    if !webgl_available(&element) {
        return;
    }
    let bus = EventBus::new();
    let registry = Rc::new(GeometryRegistry::procedural(&bus));
    let mut pool = VisualizerPool::new(registry, bus, PoolOptions::default());

    let id = pool
        .create_visualizer(WebCanvas::new(element), "hypercube", BTreeMap::new())
        .unwrap();
    assert_eq!(id, "web-pool");
    assert!(pool.get_visualizer(&id).unwrap().bound_uniforms().any(|u| u == "u_dimension"));

    pool.start(0.0);
    pool.update_visualizer_parameter(&id, "u_dimension", UniformValue::Scalar(5.0));
    pool.tick(16.0);
    let visualizer = pool.get_visualizer(&id).unwrap();
    assert!(visualizer.is_active());
    assert_eq!(visualizer.parameter("u_dimension"), Some(&UniformValue::Scalar(5.0)));

    assert!(pool.remove_visualizer(&id));
    assert_eq!(pool.visualizer_count(), 0);
}

#[wasm_bindgen_test]
fn boot_wires_page_and_navigates() {
    let element = canvas("background-canvas", "hypercube");
    if !webgl_available(&element) {
        return;
    }
    let visuals = r#"{ "geometries": [ { "name": "hypercube" } ] }"#;
    let behavior = r#"{ "interactionBlueprints": {} }"#;
    let states = r#"{
        "initialState": "home",
        "stateOrder": ["home", "tech"],
        "states": { "home": {}, "tech": { "activeTheme": "neon" } }
    }"#;

    let app = HyperApp::boot(visuals, behavior, states, "{}").unwrap();
    assert_eq!(app.current_state(), "home");
    assert!(app.visualizer_count() >= 1);
    assert!(app.navigate_to("tech"));
    assert_eq!(app.current_state(), "tech");
    assert!(!app.navigate_to("nowhere"));
}
