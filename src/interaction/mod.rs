//! Declarative interaction blueprints.
//!
//! A blueprint binds a trigger on every element matching its selector to a
//! list of reactions. Each reaction resolves its targets relative to the
//! element that fired and animates properties on them: `u_*` names become
//! uniform animation requests on the bus, `transform.*` names update the
//! structured inline transform and everything else is a plain CSS property.

mod blueprint;
mod scene;

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub use blueprint::{
    resolve_targets, Blueprint, DomEvent, PropertyAnimation, PropertyKind, Reaction, RevertTrigger, TargetStrategy,
    Trigger,
};
pub use scene::{
    Element, ElementId, ElementSpec, InlineStyle, SceneGraph, Selector, TransformComponent, TransformState, CARD_CLASS,
};

use crate::bus::{Event, EventBus, UniformAnimationRequest};
use crate::clock::Clock;
use crate::config::BehaviorConfig;

/// Reaction waiting for its `delay` to elapse.
#[derive(Debug, Clone)]
struct PendingReaction {
    due_ms: f64,
    target: ElementId,
    property: String,
    animation: PropertyAnimation,
}

pub struct InteractionCoordinator {
    bus: EventBus,
    clock: Rc<dyn Clock>,
    blueprints: BTreeMap<String, Blueprint>,
    pending: Vec<PendingReaction>,
    dirty: BTreeSet<ElementId>,
}

impl InteractionCoordinator {
    pub fn new(bus: EventBus, clock: Rc<dyn Clock>, behavior: &BehaviorConfig) -> Self {
        let mut blueprints = BTreeMap::new();
        for (name, blueprint) in &behavior.interaction_blueprints {
            match blueprint.validate() {
                Ok(()) => {
                    blueprints.insert(name.clone(), blueprint.clone());
                }
                Err(reason) => log::warn!("Invalid blueprint {}: {}", name, reason),
            }
        }
        log::info!("Registered {} interaction blueprints", blueprints.len());
        Self {
            bus,
            clock,
            blueprints,
            pending: Vec::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn blueprint(&self, name: &str) -> Option<&Blueprint> {
        self.blueprints.get(name)
    }

    pub fn blueprint_names(&self) -> impl Iterator<Item = &str> {
        self.blueprints.keys().map(String::as_str)
    }

    /// Attaches every blueprint to the elements its selector matches.
    /// Returns the number of new bindings.
    pub fn bind(&self, graph: &mut SceneGraph) -> usize {
        let mut bound = 0;
        for (name, blueprint) in &self.blueprints {
            for id in graph.query_all(&blueprint.selector) {
                let Some(element) = graph.element_mut(id) else {
                    continue;
                };
                if !element.blueprints.contains(name) {
                    element.blueprints.push(name.clone());
                    bound += 1;
                }
            }
        }
        log::debug!("Bound {} blueprint listeners", bound);
        bound
    }

    /// DOM events the element has listeners for.
    pub fn listened_events(&self, graph: &SceneGraph, element: ElementId) -> Vec<DomEvent> {
        let Some(element) = graph.element(element) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for blueprint in element.blueprints.iter().filter_map(|name| self.blueprints.get(name)) {
            events.push(blueprint.trigger.dom_event());
            events.extend(blueprint.revert_on.map(RevertTrigger::dom_event));
        }
        events.sort_by_key(|e| e.as_str());
        events.dedup();
        events
    }

    /// Runs every blueprint bound to `element` whose trigger or revert
    /// trigger is `event`. Returns how many ran.
    pub fn dispatch(&mut self, graph: &mut SceneGraph, element: ElementId, event: DomEvent) -> usize {
        let Some(names) = graph.element(element).map(|e| e.blueprints.clone()) else {
            return 0;
        };
        let mut executed = 0;
        for name in names {
            let Some(blueprint) = self.blueprints.get(&name) else {
                continue;
            };
            let trigger = blueprint.trigger;
            if trigger.dom_event() == event {
                let reactions = blueprint.reactions.clone();
                self.execute(graph, element, &reactions);
                log::debug!("Blueprint {} executed on {:?}", name, element);
                self.bus.publish(Event::BlueprintExecuted {
                    blueprint: name,
                    subject: element,
                    trigger,
                });
                executed += 1;
            } else if blueprint.revert_on.map(RevertTrigger::dom_event) == Some(event) {
                let reactions = blueprint.revert_reactions();
                self.execute(graph, element, &reactions);
                log::debug!("Blueprint {} reverted on {:?}", name, element);
                executed += 1;
            }
        }
        executed
    }

    fn execute(&mut self, graph: &mut SceneGraph, subject: ElementId, reactions: &[Reaction]) {
        let now = self.clock.now_ms();
        for reaction in reactions {
            for target in resolve_targets(graph, subject, reaction.target) {
                for (property, animation) in &reaction.animation {
                    if animation.delay > 0.0 {
                        self.pending.push(PendingReaction {
                            due_ms: now + animation.delay,
                            target,
                            property: property.clone(),
                            animation: animation.clone(),
                        });
                    } else {
                        self.apply(graph, target, property, animation);
                    }
                }
            }
        }
    }

    /// Applies delayed reactions that are due. Returns how many ran.
    pub fn poll(&mut self, graph: &mut SceneGraph) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let now = self.clock.now_ms();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.due_ms <= now);
        self.pending = waiting;
        for reaction in &due {
            self.apply(graph, reaction.target, &reaction.property, &reaction.animation);
        }
        due.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn apply(&mut self, graph: &mut SceneGraph, target: ElementId, property: &str, animation: &PropertyAnimation) {
        let Some(kind) = PropertyKind::classify(property) else {
            log::warn!("Unknown transform property: {}", property);
            return;
        };
        match kind {
            PropertyKind::Uniform => {
                let Some(visualizer_id) = graph.visualizer_for(target) else {
                    log::debug!("No visualizer under {:?} for {}", target, property);
                    return;
                };
                let request = UniformAnimationRequest {
                    visualizer_id: visualizer_id.to_string(),
                    uniform: property.to_string(),
                    target: animation.to.clone(),
                    duration_ms: animation.duration,
                    curve: animation.curve,
                };
                self.bus.publish(Event::AnimateUniform(request));
            }
            PropertyKind::Transform(component) => {
                let Some(element) = graph.element_mut(target) else {
                    return;
                };
                if !element.style.transform.apply(component, &animation.to) {
                    log::warn!("Cannot apply {:?} to {}", animation.to, property);
                    return;
                }
                element.style.set_transition("transform", animation.duration, animation.curve);
                self.dirty.insert(target);
            }
            PropertyKind::Css => {
                let Some(element) = graph.element_mut(target) else {
                    return;
                };
                if !element.style.apply_css(property, &animation.to) {
                    log::warn!("Cannot apply {:?} to {}", animation.to, property);
                    return;
                }
                element.style.set_transition(property, animation.duration, animation.curve);
                self.dirty.insert(target);
            }
        }
    }

    /// Elements whose inline style changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::clock::ManualClock;
    use crate::config::parse_json;
    use crate::value::ValueDescriptor;

    const BEHAVIOR: &str = r#"{
        "interactionBlueprints": {
            "focus": {
                "trigger": "onHover",
                "selector": ".adaptive-card",
                "reactions": [
                    { "target": "subject", "animation": { "u_gridDensity": { "to": "*=2", "duration": 400 } } },
                    { "target": "ecosystem", "animation": { "opacity": { "to": 0.6, "delay": 50 } } }
                ],
                "revertOn": "onLeave"
            },
            "broken": { "trigger": "onClick", "selector": ".adaptive-card", "reactions": [] }
        }
    }"#;

    fn setup() -> (InteractionCoordinator, SceneGraph, Vec<ElementId>, Rc<ManualClock>, EventBus) {
        let bus = EventBus::new();
        let clock = Rc::new(ManualClock::new(0.0));
        let behavior: BehaviorConfig = parse_json("behavior", BEHAVIOR).unwrap();
        let coordinator = InteractionCoordinator::new(bus.clone(), clock.clone(), &behavior);

        let mut graph = SceneGraph::new();
        let cards = (0..2)
            .map(|i| {
                let card = graph.add(graph.root(), ElementSpec::new().id(format!("card-{i}")).class(CARD_CLASS));
                graph.add(card, ElementSpec::new().visualizer(format!("viz-{i}")));
                card
            })
            .collect();
        (coordinator, graph, cards, clock, bus)
    }

    #[test]
    fn skips_invalid_blueprints_and_binds_valid_ones() {
        let (coordinator, mut graph, cards, _, _) = setup();
        assert_eq!(coordinator.blueprint_names().collect::<Vec<_>>(), vec!["focus"]);
        assert_eq!(coordinator.bind(&mut graph), 2);
        assert_eq!(coordinator.bind(&mut graph), 0);
        assert_eq!(graph.element(cards[0]).unwrap().blueprints, vec!["focus".to_string()]);
        assert_eq!(
            coordinator.listened_events(&graph, cards[0]),
            vec![DomEvent::MouseEnter, DomEvent::MouseLeave]
        );
    }

    #[test]
    fn hover_requests_uniform_animation_for_hosted_visualizer() {
        let (mut coordinator, mut graph, cards, _, bus) = setup();
        coordinator.bind(&mut graph);
        let requests = bus.mailbox(&[Topic::AnimateUniform, Topic::BlueprintExecuted]);

        assert_eq!(coordinator.dispatch(&mut graph, cards[0], DomEvent::MouseEnter), 1);
        let events = requests.drain();
        assert_eq!(
            events[0],
            Event::AnimateUniform(UniformAnimationRequest {
                visualizer_id: "viz-0".into(),
                uniform: "u_gridDensity".into(),
                target: ValueDescriptor::Multiply(2.0),
                duration_ms: 400.0,
                curve: crate::easing::Curve::EaseOut,
            })
        );
        assert_eq!(
            events[1],
            Event::BlueprintExecuted {
                blueprint: "focus".into(),
                subject: cards[0],
                trigger: Trigger::OnHover
            }
        );
    }

    #[test]
    fn delayed_reactions_wait_for_the_clock() {
        let (mut coordinator, mut graph, cards, clock, _) = setup();
        coordinator.bind(&mut graph);
        coordinator.dispatch(&mut graph, cards[0], DomEvent::MouseEnter);
        assert_eq!(coordinator.pending_count(), 1);
        assert_eq!(coordinator.poll(&mut graph), 0);

        clock.advance(50.0);
        assert_eq!(coordinator.poll(&mut graph), 1);
        assert_eq!(graph.element(cards[1]).unwrap().style.property("opacity"), Some("0.6"));
        assert_eq!(coordinator.take_dirty(), vec![cards[1]]);
        assert!(coordinator.take_dirty().is_empty());
    }

    #[test]
    fn revert_defaults_to_initial() {
        let (mut coordinator, mut graph, cards, clock, bus) = setup();
        coordinator.bind(&mut graph);
        coordinator.dispatch(&mut graph, cards[0], DomEvent::MouseEnter);
        clock.advance(50.0);
        coordinator.poll(&mut graph);

        let requests = bus.mailbox(&[Topic::AnimateUniform]);
        assert_eq!(coordinator.dispatch(&mut graph, cards[0], DomEvent::MouseLeave), 1);
        match &requests.drain()[..] {
            [Event::AnimateUniform(request)] => assert_eq!(request.target, ValueDescriptor::Reset),
            other => panic!("unexpected events {other:?}"),
        }
        clock.advance(50.0);
        coordinator.poll(&mut graph);
        assert_eq!(graph.element(cards[1]).unwrap().style.property("opacity"), None);
    }

    #[test]
    fn unbound_events_do_nothing() {
        let (mut coordinator, mut graph, cards, _, _) = setup();
        coordinator.bind(&mut graph);
        let root = graph.root();
        assert_eq!(coordinator.dispatch(&mut graph, cards[0], DomEvent::Click), 0);
        assert_eq!(coordinator.dispatch(&mut graph, root, DomEvent::MouseEnter), 0);
    }
}
