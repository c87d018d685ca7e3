//! Headless model of the interactive part of a page.
//!
//! Elements form a tree under a single root (the document body). Each one
//! carries the bits blueprints care about: its DOM id, its classes, the
//! visualizer it hosts and the inline style the coordinator writes.

use std::collections::{BTreeMap, BTreeSet};

use crate::easing::Curve;
use crate::value::ValueDescriptor;

/// Class shared by every top-level interactive card.
pub const CARD_CLASS: &str = "adaptive-card";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformComponent {
    Scale,
    Rotate,
    Translate,
}

impl TransformComponent {
    /// `"transform.scale"` and friends.
    pub fn from_property(property: &str) -> Option<Self> {
        match property.strip_prefix("transform.")? {
            "scale" => Some(TransformComponent::Scale),
            "rotate" => Some(TransformComponent::Rotate),
            "translate" => Some(TransformComponent::Translate),
            _ => None,
        }
    }
}

/// Structured inline transform. Identity components are not rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    pub scale: f32,
    /// Degrees.
    pub rotate: f32,
    pub translate: Option<String>,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotate: 0.0,
            translate: None,
        }
    }
}

impl TransformState {
    pub fn is_identity(&self) -> bool {
        *self == TransformState::default()
    }

    /// Returns false when the value cannot be applied to the component.
    pub fn apply(&mut self, component: TransformComponent, value: &ValueDescriptor) -> bool {
        match component {
            TransformComponent::Scale => match value.resolve(self.scale, 1.0) {
                Some(v) => self.scale = v,
                None => return false,
            },
            TransformComponent::Rotate => match value.resolve(self.rotate, 0.0) {
                Some(v) => self.rotate = v,
                None => return false,
            },
            TransformComponent::Translate => match value {
                ValueDescriptor::Set(v) => self.translate = Some(format!("{}px", v)),
                ValueDescriptor::Raw(text) => self.translate = Some(text.clone()),
                ValueDescriptor::Reset => self.translate = None,
                ValueDescriptor::Add(_) | ValueDescriptor::Multiply(_) => return false,
            },
        }
        true
    }

    /// CSS `transform` value, `None` for the identity.
    pub fn to_css(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.scale != 1.0 {
            parts.push(format!("scale({})", self.scale));
        }
        if self.rotate != 0.0 {
            parts.push(format!("rotate({}deg)", self.rotate));
        }
        if let Some(translate) = &self.translate {
            parts.push(format!("translate({})", translate));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Inline style written by reactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    pub transform: TransformState,
    properties: BTreeMap<String, String>,
    transitions: BTreeMap<String, String>,
    removed: BTreeSet<String>,
}

impl InlineStyle {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_property(&mut self, name: &str, value: String) {
        self.removed.remove(name);
        self.properties.insert(name.to_string(), value);
    }

    pub fn remove_property(&mut self, name: &str) {
        if self.properties.remove(name).is_some() {
            self.removed.insert(name.to_string());
        }
    }

    /// Applies a DSL value to a CSS property. `initial` drops the inline
    /// value so the stylesheet applies again; arithmetic needs a numeric
    /// current value.
    pub fn apply_css(&mut self, name: &str, value: &ValueDescriptor) -> bool {
        match value {
            ValueDescriptor::Raw(text) => self.set_property(name, text.clone()),
            ValueDescriptor::Reset => self.remove_property(name),
            numeric => {
                let current = self.property(name).and_then(|v| v.trim().parse::<f32>().ok());
                let needs_current = matches!(numeric, ValueDescriptor::Add(_) | ValueDescriptor::Multiply(_));
                if needs_current && current.is_none() {
                    return false;
                }
                match numeric.resolve(current.unwrap_or(0.0), 0.0) {
                    Some(v) => self.set_property(name, v.to_string()),
                    None => return false,
                }
            }
        }
        true
    }

    pub fn set_transition(&mut self, property: &str, duration_ms: f64, curve: Curve) {
        self.transitions.insert(
            property.to_string(),
            format!("{} {}ms {}", property, duration_ms, curve.css_timing_function()),
        );
    }

    /// CSS `transition` value covering every animated property.
    pub fn transition(&self) -> Option<String> {
        if self.transitions.is_empty() {
            return None;
        }
        Some(self.transitions.values().cloned().collect::<Vec<_>>().join(", "))
    }

    pub fn transform_css(&self) -> Option<String> {
        self.transform.to_css()
    }

    /// Properties dropped since the last call.
    pub fn take_removed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.removed).into_iter().collect()
    }
}

/// Description of an element to add to the graph.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    dom_id: Option<String>,
    classes: Vec<String>,
    visualizer_id: Option<String>,
}

impl ElementSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.dom_id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Marks the element as a canvas hosting this visualizer.
    pub fn visualizer(mut self, visualizer_id: impl Into<String>) -> Self {
        self.visualizer_id = Some(visualizer_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub dom_id: Option<String>,
    pub classes: BTreeSet<String>,
    pub visualizer_id: Option<String>,
    pub blueprints: Vec<String>,
    pub style: InlineStyle,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    fn new(spec: ElementSpec, parent: Option<ElementId>) -> Self {
        Self {
            dom_id: spec.dom_id,
            classes: spec.classes.into_iter().collect(),
            visualizer_id: spec.visualizer_id,
            blueprints: Vec::new(),
            style: InlineStyle::default(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

/// Compound selector: `*`, or any run of `#id` and `.class` parts.
#[derive(Debug, Clone, PartialEq)]
struct Compound {
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "*" {
            return Some(Compound { id: None, classes: Vec::new() });
        }
        if text.is_empty() || !text.starts_with(['#', '.']) {
            return None;
        }
        let mut compound = Compound { id: None, classes: Vec::new() };
        let mut rest = text;
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return None;
            }
            match marker {
                '#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(id) = &self.id {
            if element.dom_id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|class| element.has_class(class))
    }
}

/// Comma-separated list of compound selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector(Vec<Compound>);

impl Selector {
    /// `None` when any part uses syntax beyond ids, classes and `*`.
    pub fn parse(text: &str) -> Option<Self> {
        text.split(',').map(Compound::parse).collect::<Option<Vec<_>>>().map(Selector)
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.0.iter().any(|compound| compound.matches(element))
    }
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    elements: Vec<Element>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            elements: vec![Element::new(ElementSpec::new(), None)],
        }
    }

    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Adds a child of `parent`. An unknown parent attaches to the root.
    pub fn add(&mut self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let parent = if parent.0 < self.elements.len() { parent } else { self.root() };
        let id = ElementId(self.elements.len());
        self.elements.push(Element::new(spec, Some(parent)));
        self.elements[parent.0].children.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.element(id)?.parent
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.element(id).map(Element::children).unwrap_or(&[])
    }

    /// Same as DOM `contains`: true for the node itself.
    pub fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn find_by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .position(|e| e.dom_id.as_deref() == Some(dom_id))
            .map(ElementId)
    }

    /// Every element in document order.
    pub fn descendants(&self, from: ElementId) -> Vec<ElementId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Matching elements in document order. The root is never matched.
    pub fn query_all(&self, selector: &str) -> Vec<ElementId> {
        let Some(selector) = Selector::parse(selector) else {
            log::warn!("Unsupported selector: {}", selector);
            return Vec::new();
        };
        self.descendants(self.root())
            .into_iter()
            .skip(1)
            .filter(|id| selector.matches(&self.elements[id.0]))
            .collect()
    }

    /// The element's own visualizer, else the first one hosted beneath it.
    pub fn visualizer_for(&self, id: ElementId) -> Option<&str> {
        self.descendants(id)
            .into_iter()
            .find_map(|e| self.elements[e.0].visualizer_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck() -> (SceneGraph, ElementId, Vec<ElementId>) {
        let mut graph = SceneGraph::new();
        let grid = graph.add(graph.root(), ElementSpec::new().id("grid").class("card-grid"));
        let cards = (0..3)
            .map(|i| {
                let card = graph.add(grid, ElementSpec::new().id(format!("card-{i}")).class(CARD_CLASS));
                graph.add(card, ElementSpec::new().class("card-visualizer").visualizer(format!("viz-{i}")));
                card
            })
            .collect();
        (graph, grid, cards)
    }

    #[test]
    fn selectors_match_ids_classes_and_lists() {
        let (graph, grid, cards) = deck();
        assert_eq!(graph.query_all(".adaptive-card"), cards);
        assert_eq!(graph.query_all("#card-1"), vec![cards[1]]);
        assert_eq!(graph.query_all("#grid, #card-2"), vec![grid, cards[2]]);
        assert_eq!(graph.query_all("#card-0.adaptive-card"), vec![cards[0]]);
        assert!(graph.query_all("div > .adaptive-card").is_empty());
        assert_eq!(graph.query_all("*").len(), 7);
    }

    #[test]
    fn contains_is_inclusive() {
        let (graph, grid, cards) = deck();
        assert!(graph.contains(grid, cards[0]));
        assert!(graph.contains(cards[0], cards[0]));
        assert!(!graph.contains(cards[0], grid));
    }

    #[test]
    fn visualizer_lookup_descends() {
        let (graph, grid, cards) = deck();
        assert_eq!(graph.visualizer_for(cards[2]), Some("viz-2"));
        assert_eq!(graph.visualizer_for(grid), Some("viz-0"));
        assert_eq!(graph.find_by_dom_id("card-1"), Some(cards[1]));
    }

    #[test]
    fn transform_renders_non_identity_parts() {
        let mut transform = TransformState::default();
        assert_eq!(transform.to_css(), None);
        assert!(transform.apply(TransformComponent::Scale, &ValueDescriptor::Set(1.2)));
        assert!(transform.apply(TransformComponent::Rotate, &ValueDescriptor::Add(45.0)));
        assert!(transform.apply(TransformComponent::Translate, &ValueDescriptor::Raw("0, -4px".into())));
        assert_eq!(transform.to_css().as_deref(), Some("scale(1.2) rotate(45deg) translate(0, -4px)"));
        assert!(!transform.apply(TransformComponent::Translate, &ValueDescriptor::Multiply(2.0)));

        for component in [TransformComponent::Scale, TransformComponent::Rotate, TransformComponent::Translate] {
            transform.apply(component, &ValueDescriptor::Reset);
        }
        assert!(transform.is_identity());
    }

    #[test]
    fn css_values_follow_the_dsl() {
        let mut style = InlineStyle::default();
        assert!(!style.apply_css("opacity", &ValueDescriptor::Multiply(0.5)));
        assert!(style.apply_css("opacity", &ValueDescriptor::Set(0.8)));
        assert!(style.apply_css("opacity", &ValueDescriptor::Multiply(0.5)));
        assert_eq!(style.property("opacity"), Some("0.4"));
        assert!(style.apply_css("filter", &ValueDescriptor::Raw("blur(2px)".into())));

        style.set_transition("opacity", 300.0, Curve::EaseOut);
        assert_eq!(style.transition().as_deref(), Some("opacity 300ms ease-out"));

        assert!(style.apply_css("opacity", &ValueDescriptor::Reset));
        assert_eq!(style.property("opacity"), None);
        assert_eq!(style.take_removed(), vec!["opacity".to_string()]);
        assert!(style.take_removed().is_empty());
    }
}
