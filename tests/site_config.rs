use std::path::{Path, PathBuf};
use std::rc::Rc;

use hyperviz_wasm::bus::EventBus;
use hyperviz_wasm::clock::ManualClock;
use hyperviz_wasm::config::{load_json, BehaviorConfig, StateMapConfig, VisualsConfig};
use hyperviz_wasm::geometry::{FsShaderLoader, GeometryRegistry};
use hyperviz_wasm::interaction::InteractionCoordinator;
use hyperviz_wasm::navigation::{HomeMaster, NavigationAction};

fn site() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("static")
}

#[test]
fn bundled_shader_file_honours_the_contract() {
    let visuals: VisualsConfig = load_json(&site().join("config/visuals.json")).unwrap();
    let registry = GeometryRegistry::initialize(&visuals, &FsShaderLoader::new(site()), &EventBus::new()).unwrap();

    assert_eq!(registry.len(), visuals.geometries.as_ref().unwrap().len());
    let shader = registry.get_shader("tetrahedron").unwrap();
    assert!(shader.vertex_source.contains("a_texCoord"));
    assert!(shader.missing_contract_uniforms().is_empty());
    for name in registry.geometry_names() {
        assert!(registry.get_shader(name).unwrap().missing_contract_uniforms().is_empty(), "{name}");
    }
}

#[test]
fn bundled_blueprints_are_all_valid() {
    let behavior: BehaviorConfig = load_json(&site().join("config/behavior.json")).unwrap();
    let coordinator = InteractionCoordinator::new(EventBus::new(), Rc::new(ManualClock::new(0.0)), &behavior);
    assert_eq!(coordinator.blueprint_names().count(), behavior.interaction_blueprints.len());
}

#[test]
fn bundled_state_map_navigates() {
    let states: StateMapConfig = load_json(&site().join("config/states.json")).unwrap();
    assert_eq!(states.navigation["ArrowDown"], NavigationAction::NavigateNext);

    let clock = Rc::new(ManualClock::new(0.0));
    let mut master = HomeMaster::new(states, EventBus::new(), clock.clone()).unwrap();
    assert_eq!(master.current_state(), "home");
    assert_eq!(master.current_theme(), "dark_matter");

    assert!(master.handle_key("3"));
    assert_eq!(master.current_state(), "media");
    clock.advance(150.0);
    master.poll();

    assert!(master.handle_key("ArrowDown"));
    assert_eq!(master.current_state(), "innovation");
    assert_eq!(master.background_geometry(), "crystal");
    clock.advance(150.0);
    master.poll();

    assert!(master.navigate_back());
    assert_eq!(master.current_state(), "media");
}
