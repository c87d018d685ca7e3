use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::scene::{ElementId, SceneGraph, TransformComponent, CARD_CLASS};
use crate::easing::Curve;
use crate::value::ValueDescriptor;

/// DOM events the coordinator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEvent {
    MouseEnter,
    MouseLeave,
    Click,
    MouseUp,
    Input,
    Blur,
}

impl DomEvent {
    pub const ALL: [DomEvent; 6] = [
        DomEvent::MouseEnter,
        DomEvent::MouseLeave,
        DomEvent::Click,
        DomEvent::MouseUp,
        DomEvent::Input,
        DomEvent::Blur,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DomEvent::MouseEnter => "mouseenter",
            DomEvent::MouseLeave => "mouseleave",
            DomEvent::Click => "click",
            DomEvent::MouseUp => "mouseup",
            DomEvent::Input => "input",
            DomEvent::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    OnHover,
    OnClick,
    OnInput,
}

impl Trigger {
    pub fn dom_event(self) -> DomEvent {
        match self {
            Trigger::OnHover => DomEvent::MouseEnter,
            Trigger::OnClick => DomEvent::Click,
            Trigger::OnInput => DomEvent::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevertTrigger {
    OnLeave,
    OnRelease,
    OnInputEnd,
}

impl RevertTrigger {
    pub fn dom_event(self) -> DomEvent {
        match self {
            RevertTrigger::OnLeave => DomEvent::MouseLeave,
            RevertTrigger::OnRelease => DomEvent::MouseUp,
            RevertTrigger::OnInputEnd => DomEvent::Blur,
        }
    }
}

/// Which elements a reaction lands on, relative to the triggering one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStrategy {
    Subject,
    Parent,
    Siblings,
    Children,
    Ecosystem,
    Global,
}

fn default_duration() -> f64 {
    300.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAnimation {
    pub to: ValueDescriptor,
    #[serde(default)]
    pub curve: Curve,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default)]
    pub delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub target: TargetStrategy,
    #[serde(default)]
    pub animation: BTreeMap<String, PropertyAnimation>,
}

impl Reaction {
    /// Same properties, timings and target, every value set back to `initial`.
    pub fn to_baseline(&self) -> Reaction {
        Reaction {
            target: self.target,
            animation: self
                .animation
                .iter()
                .map(|(property, animation)| {
                    let mut animation = animation.clone();
                    animation.to = ValueDescriptor::Reset;
                    (property.clone(), animation)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub trigger: Trigger,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub revert_on: Option<RevertTrigger>,
    #[serde(default)]
    pub revert_animation: Option<Vec<Reaction>>,
}

impl Blueprint {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.selector.trim().is_empty() {
            return Err("empty selector");
        }
        if self.reactions.is_empty() {
            return Err("no reactions");
        }
        Ok(())
    }

    /// Reactions that run on the revert trigger.
    pub fn revert_reactions(&self) -> Vec<Reaction> {
        match &self.revert_animation {
            Some(reactions) => reactions.clone(),
            None => self.reactions.iter().map(Reaction::to_baseline).collect(),
        }
    }
}

/// How an animated property is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Uniform,
    Transform(TransformComponent),
    Css,
}

impl PropertyKind {
    /// `None` for an unknown `transform.*` component.
    pub fn classify(property: &str) -> Option<Self> {
        if property.starts_with("u_") {
            Some(PropertyKind::Uniform)
        } else if property.starts_with("transform.") {
            TransformComponent::from_property(property).map(PropertyKind::Transform)
        } else {
            Some(PropertyKind::Css)
        }
    }
}

pub fn resolve_targets(graph: &SceneGraph, subject: ElementId, strategy: TargetStrategy) -> Vec<ElementId> {
    match strategy {
        TargetStrategy::Subject => vec![subject],
        TargetStrategy::Parent => graph.parent(subject).into_iter().collect(),
        TargetStrategy::Siblings => match graph.parent(subject) {
            Some(parent) => graph
                .children(parent)
                .iter()
                .copied()
                .filter(|child| *child != subject)
                .collect(),
            None => Vec::new(),
        },
        TargetStrategy::Children => graph.children(subject).to_vec(),
        TargetStrategy::Ecosystem => graph
            .query_all(&format!(".{}", CARD_CLASS))
            .into_iter()
            .filter(|card| !graph.contains(subject, *card))
            .collect(),
        TargetStrategy::Global => vec![graph.root()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ElementSpec;

    #[test]
    fn blueprint_json_uses_defaults() {
        let blueprint: Blueprint = serde_json::from_str(
            r#"{
                "trigger": "onHover",
                "selector": ".adaptive-card",
                "reactions": [{ "target": "subject", "animation": { "u_gridDensity": { "to": "*=2" } } }],
                "revertOn": "onLeave"
            }"#,
        )
        .unwrap();
        let animation = &blueprint.reactions[0].animation["u_gridDensity"];
        assert_eq!(animation.to, ValueDescriptor::Multiply(2.0));
        assert_eq!(animation.curve, Curve::EaseOut);
        assert_eq!((animation.duration, animation.delay), (300.0, 0.0));
        assert_eq!(blueprint.revert_on, Some(RevertTrigger::OnLeave));

        let revert = blueprint.revert_reactions();
        assert_eq!(revert[0].animation["u_gridDensity"].to, ValueDescriptor::Reset);
    }

    #[test]
    fn invalid_blueprints_are_reported() {
        let blueprint: Blueprint = serde_json::from_str(r#"{ "trigger": "onClick", "selector": "" }"#).unwrap();
        assert_eq!(blueprint.validate(), Err("empty selector"));
    }

    #[test]
    fn classifies_properties() {
        assert_eq!(PropertyKind::classify("u_morphFactor"), Some(PropertyKind::Uniform));
        assert_eq!(
            PropertyKind::classify("transform.rotate"),
            Some(PropertyKind::Transform(TransformComponent::Rotate))
        );
        assert_eq!(PropertyKind::classify("transform.skew"), None);
        assert_eq!(PropertyKind::classify("opacity"), Some(PropertyKind::Css));
    }

    #[test]
    fn resolves_every_strategy() {
        let mut graph = SceneGraph::new();
        let grid = graph.add(graph.root(), ElementSpec::new().id("grid"));
        let a = graph.add(grid, ElementSpec::new().id("a").class(CARD_CLASS));
        let b = graph.add(grid, ElementSpec::new().id("b").class(CARD_CLASS));
        let nested = graph.add(a, ElementSpec::new().id("nested").class(CARD_CLASS));
        let label = graph.add(a, ElementSpec::new().class("label"));

        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Subject), vec![a]);
        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Parent), vec![grid]);
        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Siblings), vec![b]);
        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Children), vec![nested, label]);
        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Ecosystem), vec![b]);
        assert_eq!(resolve_targets(&graph, nested, TargetStrategy::Ecosystem), vec![a, b]);
        assert_eq!(resolve_targets(&graph, a, TargetStrategy::Global), vec![graph.root()]);
        assert!(resolve_targets(&graph, graph.root(), TargetStrategy::Parent).is_empty());
    }
}
