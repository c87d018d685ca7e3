//! Mirrors the document into a [`SceneGraph`] and writes scene changes back.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement};

use crate::interaction::{ElementId, ElementSpec, SceneGraph, CARD_CLASS};

/// Body attribute carrying the active theme name.
pub const THEME_ATTRIBUTE: &str = "data-theme";

pub struct DomScene {
    pub graph: SceneGraph,
    // Indexed by `ElementId::index`; slot 0 is the body.
    nodes: Vec<HtmlElement>,
}

impl DomScene {
    pub fn from_document(document: &Document) -> Result<Self, JsValue> {
        let body = document.body().ok_or("document has no body")?;
        let mut scene = DomScene {
            graph: SceneGraph::new(),
            nodes: vec![body.clone()],
        };
        let root = scene.graph.root();
        scene.mirror_children(&body, root);
        log::info!("Scene graph mirrors {} elements", scene.graph.len());
        Ok(scene)
    }

    fn mirror_children(&mut self, node: &Element, parent: ElementId) {
        let children = node.children();
        for index in 0..children.length() {
            let Some(child) = children.item(index) else {
                continue;
            };
            let Ok(html) = child.dyn_into::<HtmlElement>() else {
                continue;
            };
            let id = self.graph.add(parent, element_spec(&html));
            self.nodes.push(html.clone());
            self.mirror_children(&html, id);
        }
    }

    pub fn node(&self, id: ElementId) -> Option<&HtmlElement> {
        self.nodes.get(id.index())
    }

    /// Elements with at least one bound blueprint.
    pub fn interactive(&self) -> Vec<(ElementId, HtmlElement)> {
        self.graph
            .descendants(self.graph.root())
            .into_iter()
            .filter(|id| self.graph.element(*id).is_some_and(|e| !e.blueprints.is_empty()))
            .filter_map(|id| self.node(id).map(|node| (id, node.clone())))
            .collect()
    }

    /// Sets `data-blueprint` on every bound element.
    pub fn tag_blueprints(&self) -> Result<(), JsValue> {
        for (id, node) in self.interactive() {
            if let Some(element) = self.graph.element(id) {
                node.set_attribute("data-blueprint", &element.blueprints.join(" "))?;
            }
        }
        Ok(())
    }

    /// Copies the inline style of each element to its DOM node.
    pub fn sync_styles(&mut self, dirty: &[ElementId]) -> Result<(), JsValue> {
        for id in dirty {
            let (Some(element), Some(node)) = (self.graph.element_mut(*id), self.nodes.get(id.index())) else {
                continue;
            };
            let style = node.style();
            match element.style.transform_css() {
                Some(transform) => style.set_property("transform", &transform)?,
                None => {
                    style.remove_property("transform")?;
                }
            }
            if let Some(transition) = element.style.transition() {
                style.set_property("transition", &transition)?;
            }
            for (name, value) in element.style.properties() {
                style.set_property(name, value)?;
            }
            for name in element.style.take_removed() {
                style.remove_property(&name)?;
            }
        }
        Ok(())
    }

    /// Shows the listed cards and hides every other one.
    pub fn apply_active_cards(&self, active: &[String]) -> Result<(), JsValue> {
        for id in self.graph.query_all(&format!(".{}", CARD_CLASS)) {
            let (Some(element), Some(node)) = (self.graph.element(id), self.node(id)) else {
                continue;
            };
            let is_active = element.dom_id.as_ref().is_some_and(|dom_id| active.contains(dom_id));
            let classes = node.class_list();
            if is_active {
                node.style().set_property("display", "block")?;
                classes.add_1("state-active")?;
                classes.remove_1("state-inactive")?;
            } else {
                node.style().set_property("display", "none")?;
                classes.add_1("state-inactive")?;
                classes.remove_1("state-active")?;
            }
        }
        Ok(())
    }

    pub fn apply_theme(&self, theme: &str) -> Result<(), JsValue> {
        match self.nodes.first() {
            Some(body) => body.set_attribute(THEME_ATTRIBUTE, theme),
            None => Ok(()),
        }
    }
}

fn element_spec(node: &HtmlElement) -> ElementSpec {
    let mut spec = ElementSpec::new();
    let id = node.id();
    let classes = node.class_list();
    for index in 0..classes.length() {
        if let Some(class) = classes.item(index) {
            spec = spec.class(class);
        }
    }
    if !id.is_empty() {
        if node.tag_name().eq_ignore_ascii_case("canvas") {
            spec = spec.visualizer(id.clone());
        }
        spec = spec.id(id);
    }
    spec
}
