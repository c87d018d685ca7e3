//! Process-wide publish/subscribe channel.
//!
//! Every payload is a variant of [`Event`], so topics and payload shapes are
//! checked at compile time. Handlers run synchronously on `publish`. Owners
//! that must not be re-entered while they are publishing (the pool, the DOM
//! layer) subscribe a [`Mailbox`] instead and drain it on their own frame.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::config::SectionConfig;
use crate::easing::Curve;
use crate::interaction::{ElementId, Trigger};
use crate::value::{UniformValue, ValueDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    GeometryRegistryReady,
    VisualizerCreated,
    VisualizerRemoved,
    VisualizerGeometryChanged,
    VisualizerFaulted,
    VisualizerParameterUpdated,
    GlobalParameterUpdated,
    AnimateUniform,
    RenderFrame,
    StateWillChange,
    StateDidChange,
    ActiveCardsChanged,
    ThemeChanged,
    MasterParameterChanged,
    BackgroundGeometryChanged,
    BlueprintExecuted,
}

/// Request to animate one uniform of one visualizer.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformAnimationRequest {
    pub visualizer_id: String,
    pub uniform: String,
    pub target: ValueDescriptor,
    pub duration_ms: f64,
    pub curve: Curve,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    GeometryRegistryReady { geometry_count: usize, shader_count: usize },
    VisualizerCreated { id: String, geometry: String },
    VisualizerRemoved { id: String },
    VisualizerGeometryChanged { id: String, geometry: String },
    VisualizerFaulted { id: String, reason: String },
    VisualizerParameterUpdated { id: String, parameter: String, value: UniformValue },
    GlobalParameterUpdated { parameter: String, value: UniformValue },
    AnimateUniform(UniformAnimationRequest),
    RenderFrame { time: f32, visualizer_count: usize },
    StateWillChange { from: String, to: String },
    StateDidChange { new_state: String, previous_state: Option<String>, config: SectionConfig },
    ActiveCardsChanged { active_cards: Vec<String> },
    ThemeChanged { theme: String },
    MasterParameterChanged { parameter: String, value: UniformValue },
    BackgroundGeometryChanged { geometry: String },
    BlueprintExecuted { blueprint: String, subject: ElementId, trigger: Trigger },
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::GeometryRegistryReady { .. } => Topic::GeometryRegistryReady,
            Event::VisualizerCreated { .. } => Topic::VisualizerCreated,
            Event::VisualizerRemoved { .. } => Topic::VisualizerRemoved,
            Event::VisualizerGeometryChanged { .. } => Topic::VisualizerGeometryChanged,
            Event::VisualizerFaulted { .. } => Topic::VisualizerFaulted,
            Event::VisualizerParameterUpdated { .. } => Topic::VisualizerParameterUpdated,
            Event::GlobalParameterUpdated { .. } => Topic::GlobalParameterUpdated,
            Event::AnimateUniform(_) => Topic::AnimateUniform,
            Event::RenderFrame { .. } => Topic::RenderFrame,
            Event::StateWillChange { .. } => Topic::StateWillChange,
            Event::StateDidChange { .. } => Topic::StateDidChange,
            Event::ActiveCardsChanged { .. } => Topic::ActiveCardsChanged,
            Event::ThemeChanged { .. } => Topic::ThemeChanged,
            Event::MasterParameterChanged { .. } => Topic::MasterParameterChanged,
            Event::BackgroundGeometryChanged { .. } => Topic::BackgroundGeometryChanged,
            Event::BlueprintExecuted { .. } => Topic::BlueprintExecuted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&Event)>;

#[derive(Default)]
struct BusInner {
    handlers: HashMap<Topic, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

/// Cheaply clonable handle to a shared bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, handler: impl Fn(&Event) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.entry(topic).or_default().push((id, Rc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        for handlers in inner.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(h, _)| *h == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Queue every event of the given topics into a mailbox.
    pub fn mailbox(&self, topics: &[Topic]) -> Mailbox {
        let mailbox = Mailbox::default();
        for &topic in topics {
            let queue = mailbox.queue.clone();
            self.subscribe(topic, move |event| queue.borrow_mut().push_back(event.clone()));
        }
        mailbox
    }

    pub fn publish(&self, event: Event) {
        // Handlers are cloned out so they may subscribe or publish themselves.
        let handlers: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .get(&event.topic())
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        log::trace!("publish {:?} to {} handler(s)", event.topic(), handlers.len());
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner.borrow().handlers.get(&topic).map_or(0, Vec::len)
    }
}

/// Queue of events waiting for their owner's next frame.
#[derive(Clone, Default)]
pub struct Mailbox {
    queue: Rc<RefCell<VecDeque<Event>>>,
}

impl Mailbox {
    pub fn drain(&self) -> Vec<Event> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
