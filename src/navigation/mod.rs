//! Section navigation.
//!
//! [`HomeMaster`] owns the current section and cascades its configuration
//! onto the bus: active cards, theme, master parameters and background
//! geometry, each as its own event. A transition stays open for a short
//! settle window during which further navigation is refused.

mod action;
pub mod gesture;

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub use action::NavigationAction;
use gesture::Step;

use crate::bus::{Event, EventBus};
use crate::clock::Clock;
use crate::config::{SectionConfig, StateMapConfig};
use crate::error::ConfigError;
use crate::value::UniformValue;

pub const HISTORY_LIMIT: usize = 10;
pub const DEFAULT_SETTLE_MS: f64 = 100.0;
pub const DEFAULT_THEME: &str = "dark_matter";
pub const DEFAULT_BACKGROUND_GEOMETRY: &str = "hypercube";

/// Serializable copy of the navigation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSnapshot {
    pub current_state: String,
    #[serde(default)]
    pub previous_state: Option<String>,
    #[serde(default)]
    pub state_history: Vec<String>,
    #[serde(default)]
    pub active_cards: Vec<String>,
    #[serde(default)]
    pub current_theme: Option<String>,
    #[serde(default)]
    pub master_parameters: BTreeMap<String, UniformValue>,
    #[serde(default)]
    pub is_transitioning: bool,
}

pub struct HomeMaster {
    config: StateMapConfig,
    order: Vec<String>,
    initial_state: String,
    settle_ms: f64,
    bus: EventBus,
    clock: Rc<dyn Clock>,
    current_state: String,
    previous_state: Option<String>,
    history: VecDeque<String>,
    active_cards: Vec<String>,
    current_theme: String,
    master_parameters: BTreeMap<String, UniformValue>,
    background_geometry: String,
    transition_started: Option<f64>,
}

impl HomeMaster {
    pub fn new(config: StateMapConfig, bus: EventBus, clock: Rc<dyn Clock>) -> Result<Self, ConfigError> {
        if config.states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        let order = if config.state_order.is_empty() {
            config.states.keys().cloned().collect()
        } else {
            config.state_order.clone()
        };
        if let Some(name) = order.iter().find(|name| !config.states.contains_key(*name)) {
            return Err(ConfigError::UnknownState {
                context: "stateOrder",
                name: name.clone(),
            });
        }
        let initial_state = config.initial_state.clone().unwrap_or_else(|| order[0].clone());
        if !config.states.contains_key(&initial_state) {
            return Err(ConfigError::UnknownState {
                context: "initialState",
                name: initial_state,
            });
        }
        for (key, action) in &config.navigation {
            if let NavigationAction::NavigateTo(target) = action {
                if !config.states.contains_key(target) {
                    log::warn!("Key {} navigates to unknown state {}", key, target);
                }
            }
        }

        let mut master = Self {
            settle_ms: config.settle_ms.unwrap_or(DEFAULT_SETTLE_MS),
            order,
            current_state: initial_state.clone(),
            initial_state,
            config,
            bus,
            clock,
            previous_state: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT + 1),
            active_cards: Vec::new(),
            current_theme: DEFAULT_THEME.to_string(),
            master_parameters: BTreeMap::new(),
            background_geometry: DEFAULT_BACKGROUND_GEOMETRY.to_string(),
            transition_started: None,
        };
        log::info!(
            "HomeMaster initialized with states: {:?}",
            master.config.states.keys().collect::<Vec<_>>()
        );
        master.apply_current_state();
        Ok(master)
    }

    pub fn navigate_to(&mut self, target: &str) -> bool {
        if !self.config.states.contains_key(target) {
            log::error!("Invalid state: {}", target);
            return false;
        }
        if self.current_state == target {
            log::debug!("Already in state: {}", target);
            return true;
        }
        if self.is_transitioning() {
            log::warn!("Navigation to {} blocked, transition in progress", target);
            return false;
        }

        log::info!("Navigating: {} -> {}", self.current_state, target);
        self.transition_started = Some(self.clock.now_ms());
        self.bus.publish(Event::StateWillChange {
            from: self.current_state.clone(),
            to: target.to_string(),
        });

        let previous = std::mem::replace(&mut self.current_state, target.to_string());
        self.history.push_back(previous.clone());
        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.previous_state = Some(previous);
        self.apply_current_state();
        true
    }

    pub fn navigate_next(&mut self) -> bool {
        let target = match self.order_index() {
            Some(index) => self.order[(index + 1) % self.order.len()].clone(),
            None => self.order[0].clone(),
        };
        self.navigate_to(&target)
    }

    pub fn navigate_previous(&mut self) -> bool {
        let len = self.order.len();
        let target = match self.order_index() {
            Some(index) => self.order[(index + len - 1) % len].clone(),
            None => self.order[len - 1].clone(),
        };
        self.navigate_to(&target)
    }

    /// Returns to the most recent history entry. The entry is kept when the
    /// navigation is refused.
    pub fn navigate_back(&mut self) -> bool {
        let Some(last) = self.history.pop_back() else {
            return false;
        };
        if self.navigate_to(&last) {
            return true;
        }
        self.history.push_back(last);
        false
    }

    pub fn cycle_state(&mut self) -> bool {
        self.navigate_next()
    }

    pub fn execute(&mut self, action: &NavigationAction) -> bool {
        match action {
            NavigationAction::NavigateTo(target) => self.navigate_to(target),
            NavigationAction::NavigateNext => self.navigate_next(),
            NavigationAction::NavigatePrevious => self.navigate_previous(),
            NavigationAction::CycleState => self.cycle_state(),
            NavigationAction::NavigateBack => self.navigate_back(),
        }
    }

    /// Ends the open transition once the settle window has passed and
    /// announces the new state. Returns true when it did.
    pub fn poll(&mut self) -> bool {
        let Some(started) = self.transition_started else {
            return false;
        };
        if self.clock.now_ms() - started < self.settle_ms {
            return false;
        }
        self.transition_started = None;
        self.bus.publish(Event::StateDidChange {
            new_state: self.current_state.clone(),
            previous_state: self.previous_state.clone(),
            config: self.current_config().cloned().unwrap_or_default(),
        });
        true
    }

    /// Keyboard translator. Configured keys win over the built-in ones.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if self.is_transitioning() {
            return false;
        }
        let navigation = &self.config.navigation;
        let configured = navigation
            .get(key)
            .or_else(|| navigation.get(&format!("Key{}", key.to_uppercase())))
            .or_else(|| navigation.get(&format!("Digit{}", key)))
            .cloned();
        if let Some(action) = configured {
            return self.execute(&action);
        }
        match key {
            "ArrowLeft" => self.navigate_previous(),
            "ArrowRight" => self.navigate_next(),
            "ArrowUp" => {
                let initial = self.initial_state.clone();
                self.navigate_to(&initial)
            }
            " " | "Space" | "Spacebar" => self.cycle_state(),
            "Backspace" => self.navigate_back(),
            _ => false,
        }
    }

    pub fn handle_wheel(&mut self, delta_y: f64) -> bool {
        if self.is_transitioning() {
            return false;
        }
        match gesture::wheel_step(delta_y) {
            Some(step) => self.step(step),
            None => false,
        }
    }

    pub fn handle_swipe(&mut self, step: Step) -> bool {
        if self.is_transitioning() {
            return false;
        }
        self.step(step)
    }

    fn step(&mut self, step: Step) -> bool {
        match step {
            Step::Next => self.navigate_next(),
            Step::Previous => self.navigate_previous(),
        }
    }

    fn order_index(&self) -> Option<usize> {
        self.order.iter().position(|name| *name == self.current_state)
    }

    fn apply_current_state(&mut self) {
        let Some(section) = self.config.states.get(&self.current_state).cloned() else {
            log::error!("No configuration for state: {}", self.current_state);
            return;
        };

        self.active_cards = section.active_cards;
        self.bus.publish(Event::ActiveCardsChanged {
            active_cards: self.active_cards.clone(),
        });

        self.current_theme = section.active_theme.unwrap_or_else(|| DEFAULT_THEME.to_string());
        self.bus.publish(Event::ThemeChanged {
            theme: self.current_theme.clone(),
        });

        for (parameter, value) in section.master_parameters {
            self.master_parameters.insert(parameter.clone(), value.clone());
            self.bus.publish(Event::MasterParameterChanged { parameter, value });
        }

        self.background_geometry = section
            .background_geometry
            .unwrap_or_else(|| DEFAULT_BACKGROUND_GEOMETRY.to_string());
        self.bus.publish(Event::BackgroundGeometryChanged {
            geometry: self.background_geometry.clone(),
        });

        log::info!(
            "Applied state: {} ({} cards, theme {}, {} parameters)",
            self.current_state,
            self.active_cards.len(),
            self.current_theme,
            self.master_parameters.len()
        );
    }

    pub fn export_state(&self) -> NavigationSnapshot {
        NavigationSnapshot {
            current_state: self.current_state.clone(),
            previous_state: self.previous_state.clone(),
            state_history: self.history.iter().cloned().collect(),
            active_cards: self.active_cards.clone(),
            current_theme: Some(self.current_theme.clone()),
            master_parameters: self.master_parameters.clone(),
            is_transitioning: self.is_transitioning(),
        }
    }

    /// Reinstates a snapshot and re-applies its state. Snapshots naming an
    /// unknown state are rejected.
    pub fn restore_state(&mut self, snapshot: NavigationSnapshot) -> bool {
        if !self.config.states.contains_key(&snapshot.current_state) {
            log::error!("Cannot restore unknown state: {}", snapshot.current_state);
            return false;
        }
        self.current_state = snapshot.current_state;
        self.previous_state = snapshot.previous_state;
        self.history = snapshot
            .state_history
            .into_iter()
            .filter(|name| self.config.states.contains_key(name))
            .collect();
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.current_theme = snapshot.current_theme.unwrap_or_else(|| DEFAULT_THEME.to_string());
        self.master_parameters = snapshot.master_parameters;
        self.transition_started = None;
        self.apply_current_state();
        log::info!("HomeMaster state restored: {}", self.current_state);
        true
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub fn previous_state(&self) -> Option<&str> {
        self.previous_state.as_deref()
    }

    pub fn state_history(&self) -> Vec<&str> {
        self.history.iter().map(String::as_str).collect()
    }

    pub fn current_config(&self) -> Option<&SectionConfig> {
        self.config.states.get(&self.current_state)
    }

    pub fn state_parameter(&self, name: &str) -> Option<&UniformValue> {
        self.current_config()?.master_parameters.get(name)
    }

    pub fn states(&self) -> Vec<&str> {
        self.config.states.keys().map(String::as_str).collect()
    }

    pub fn state_order(&self) -> &[String] {
        &self.order
    }

    pub fn active_cards(&self) -> &[String] {
        &self.active_cards
    }

    pub fn current_theme(&self) -> &str {
        &self.current_theme
    }

    pub fn master_parameters(&self) -> &BTreeMap<String, UniformValue> {
        &self.master_parameters
    }

    pub fn background_geometry(&self) -> &str {
        &self.background_geometry
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition_started.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::bus::Topic;
    use crate::clock::ManualClock;
    use crate::config::parse_json;

    const STATES: &str = r#"{
        "initialState": "home",
        "stateOrder": ["home", "tech", "media"],
        "states": {
            "home": { "activeCards": ["intro"], "masterParameters": { "u_dimension": 4.0 } },
            "tech": {
                "activeCards": ["rust", "wasm"],
                "activeTheme": "neon",
                "masterParameters": { "u_gridDensity": 12.0 },
                "backgroundGeometry": "torus"
            },
            "media": { "activeCards": [] }
        },
        "navigation": { "t": "navigateTo('tech')", "Digit9": "navigateBack()" }
    }"#;

    fn master() -> (HomeMaster, Rc<ManualClock>, EventBus) {
        let bus = EventBus::new();
        let clock = Rc::new(ManualClock::new(0.0));
        let config = parse_json("states", STATES).unwrap();
        let master = HomeMaster::new(config, bus.clone(), clock.clone()).unwrap();
        (master, clock, bus)
    }

    fn settle(master: &mut HomeMaster, clock: &ManualClock) {
        clock.advance(DEFAULT_SETTLE_MS);
        assert!(master.poll());
    }

    #[test]
    fn rejects_bad_configuration() {
        let bus = EventBus::new();
        let clock: Rc<dyn Clock> = Rc::new(ManualClock::new(0.0));
        let empty = StateMapConfig::default();
        assert!(matches!(
            HomeMaster::new(empty, bus.clone(), clock.clone()),
            Err(ConfigError::NoStates)
        ));

        let mut config: StateMapConfig = parse_json("states", STATES).unwrap();
        config.initial_state = Some("lost".into());
        assert!(matches!(
            HomeMaster::new(config, bus, clock),
            Err(ConfigError::UnknownState { context: "initialState", .. })
        ));
    }

    #[test]
    fn initial_state_is_applied() {
        let (master, _, _) = master();
        assert_eq!(master.current_state(), "home");
        assert_eq!(master.active_cards(), ["intro".to_string()]);
        assert_eq!(master.current_theme(), DEFAULT_THEME);
        assert_eq!(master.background_geometry(), DEFAULT_BACKGROUND_GEOMETRY);
        assert!(!master.is_transitioning());
        assert!(master.state_history().is_empty());
    }

    #[test]
    fn cascade_is_published_in_order() {
        let (mut master, _, bus) = master();
        let events = bus.mailbox(&[
            Topic::StateWillChange,
            Topic::ActiveCardsChanged,
            Topic::ThemeChanged,
            Topic::MasterParameterChanged,
            Topic::BackgroundGeometryChanged,
        ]);
        assert!(master.navigate_to("tech"));
        let topics: Vec<Topic> = events.drain().iter().map(Event::topic).collect();
        assert_eq!(
            topics,
            vec![
                Topic::StateWillChange,
                Topic::ActiveCardsChanged,
                Topic::ThemeChanged,
                Topic::MasterParameterChanged,
                Topic::BackgroundGeometryChanged,
            ]
        );
        assert_eq!(master.master_parameters().len(), 2);
        assert_eq!(master.background_geometry(), "torus");
    }

    #[test]
    fn transition_is_open_when_will_change_is_delivered() {
        let (mut master, clock, bus) = master();
        let announced = Rc::new(Cell::new(None));
        let seen = announced.clone();
        bus.subscribe(Topic::StateWillChange, move |event| {
            if let Event::StateWillChange { from, to } = event {
                seen.set(Some((from.clone(), to.clone())));
            }
        });

        assert!(master.navigate_to("tech"));
        assert_eq!(announced.take(), Some(("home".to_string(), "tech".to_string())));
        assert!(master.is_transitioning());
        assert!(!master.navigate_to("media"));
        assert_eq!(announced.take(), None);

        settle(&mut master, &clock);
        assert!(!master.is_transitioning());
        assert!(master.navigate_to("media"));
        assert_eq!(announced.take(), Some(("tech".to_string(), "media".to_string())));
    }

    #[test]
    fn will_change_names_both_states() {
        let (mut master, _, bus) = master();
        let will_change = bus.mailbox(&[Topic::StateWillChange]);
        master.navigate_to("media");
        assert_eq!(
            will_change.drain(),
            vec![Event::StateWillChange { from: "home".into(), to: "media".into() }]
        );
        assert!(master.is_transitioning());
    }

    #[test]
    fn navigating_to_current_state_is_idempotent() {
        let (mut master, _, _) = master();
        for _ in 0..3 {
            assert!(master.navigate_to("home"));
        }
        assert!(master.state_history().is_empty());
        assert!(!master.navigate_to("nowhere"));
    }

    #[test]
    fn overlapping_navigation_is_refused() {
        let (mut master, clock, bus) = master();
        let did_change = bus.mailbox(&[Topic::StateDidChange]);
        assert!(master.navigate_to("tech"));
        assert!(!master.navigate_to("media"));
        assert_eq!(master.current_state(), "tech");

        clock.advance(DEFAULT_SETTLE_MS - 1.0);
        assert!(!master.poll());
        clock.advance(1.0);
        assert!(master.poll());
        assert!(!master.is_transitioning());
        match &did_change.drain()[..] {
            [Event::StateDidChange { new_state, previous_state, config }] => {
                assert_eq!(new_state, "tech");
                assert_eq!(previous_state.as_deref(), Some("home"));
                assert_eq!(config.active_theme.as_deref(), Some("neon"));
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(master.navigate_to("media"));
    }

    #[test]
    fn history_is_capped_with_fifo_eviction() {
        let (mut master, clock, _) = master();
        for _ in 0..12 {
            assert!(master.navigate_next());
            settle(&mut master, &clock);
        }
        let history = master.state_history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        // twelve pushes cycling home, tech, media; the first two are gone
        assert_eq!(history[0], "media");
        assert_eq!(history[1], "home");
        assert_eq!(history[HISTORY_LIMIT - 1], "media");
    }

    #[test]
    fn next_and_previous_wrap() {
        let (mut master, clock, _) = master();
        assert!(master.navigate_previous());
        assert_eq!(master.current_state(), "media");
        settle(&mut master, &clock);
        assert!(master.navigate_next());
        assert_eq!(master.current_state(), "home");
    }

    #[test]
    fn back_restores_prior_state() {
        let (mut master, clock, _) = master();
        master.navigate_to("tech");
        settle(&mut master, &clock);
        assert!(master.navigate_back());
        assert_eq!(master.current_state(), "home");
        settle(&mut master, &clock);
        assert_eq!(master.state_history(), vec!["tech"]);
    }

    #[test]
    fn refused_back_keeps_history() {
        let (mut master, _, _) = master();
        master.navigate_to("tech");
        assert!(!master.navigate_back());
        assert_eq!(master.state_history(), vec!["home"]);
    }

    #[test]
    fn keys_use_configured_actions_first() {
        let (mut master, clock, _) = master();
        assert!(master.handle_key("t"));
        assert_eq!(master.current_state(), "tech");
        assert!(!master.handle_key("ArrowRight"));
        settle(&mut master, &clock);

        assert!(master.handle_key("9"));
        assert_eq!(master.current_state(), "home");
        settle(&mut master, &clock);

        assert!(master.handle_key("ArrowRight"));
        settle(&mut master, &clock);
        assert!(master.handle_key("ArrowUp"));
        assert_eq!(master.current_state(), "home");
        assert!(!master.handle_key("q"));
    }

    #[test]
    fn wheel_needs_threshold() {
        let (mut master, _, _) = master();
        assert!(!master.handle_wheel(20.0));
        assert_eq!(master.current_state(), "home");
        assert!(master.handle_wheel(-120.0));
        assert_eq!(master.current_state(), "media");
    }

    #[test]
    fn snapshot_round_trip() {
        let (mut master, clock, _) = master();
        master.navigate_to("tech");
        settle(&mut master, &clock);
        let snapshot = master.export_state();
        let json = serde_json::to_string(&snapshot).unwrap();

        let (mut restored, _, _) = self::master();
        assert!(restored.restore_state(serde_json::from_str(&json).unwrap()));
        assert_eq!(restored.current_state(), "tech");
        assert_eq!(restored.state_history(), vec!["home"]);
        assert_eq!(restored.current_theme(), "neon");
        assert_eq!(restored.export_state(), snapshot);

        let mut bad = snapshot;
        bad.current_state = "lost".into();
        assert!(!restored.restore_state(bad));
    }
}
