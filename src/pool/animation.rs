use std::collections::BTreeMap;

use crate::easing::Curve;
use crate::value::UniformValue;

/// Interpolation of one uniform of one visualizer.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformAnimationTask {
    pub visualizer_id: String,
    pub uniform: String,
    pub start_value: UniformValue,
    pub final_value: UniformValue,
    pub start_time: f64,
    pub duration_ms: f64,
    pub curve: Curve,
}

impl UniformAnimationTask {
    /// Linear progress in `[0, 1]`. Non-positive durations complete at once.
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_time) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    pub fn value_at(&self, now_ms: f64) -> UniformValue {
        let eased = self.curve.apply(self.progress(now_ms));
        self.start_value.lerp(&self.final_value, eased)
    }
}

/// Uniform write produced by one animation step.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationStep {
    pub visualizer_id: String,
    pub uniform: String,
    pub value: UniformValue,
}

/// At most one task per `(visualizer, uniform)`; starting a task replaces
/// whatever was running in that slot.
#[derive(Debug, Default)]
pub struct AnimationSlots {
    tasks: BTreeMap<(String, String), UniformAnimationTask>,
}

impl AnimationSlots {
    /// Returns the superseded task, if any.
    pub fn start(&mut self, task: UniformAnimationTask) -> Option<UniformAnimationTask> {
        let key = (task.visualizer_id.clone(), task.uniform.clone());
        self.tasks.insert(key, task)
    }

    pub fn cancel(&mut self, visualizer_id: &str, uniform: &str) -> Option<UniformAnimationTask> {
        self.tasks.remove(&(visualizer_id.to_string(), uniform.to_string()))
    }

    pub fn cancel_visualizer(&mut self, visualizer_id: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|(id, _), _| id != visualizer_id);
        before - self.tasks.len()
    }

    pub fn get(&self, visualizer_id: &str, uniform: &str) -> Option<&UniformAnimationTask> {
        self.tasks.get(&(visualizer_id.to_string(), uniform.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Computes this frame's value of every task and drops finished ones.
    pub fn advance(&mut self, now_ms: f64) -> Vec<AnimationStep> {
        let mut steps = Vec::with_capacity(self.tasks.len());
        self.tasks.retain(|(visualizer_id, uniform), task| {
            let done = task.progress(now_ms) >= 1.0;
            let value = if done {
                task.final_value.clone()
            } else {
                task.value_at(now_ms)
            };
            steps.push(AnimationStep {
                visualizer_id: visualizer_id.clone(),
                uniform: uniform.clone(),
                value,
            });
            if done {
                log::debug!("Uniform animation complete: {}.{} = {}", visualizer_id, uniform, task.final_value);
            }
            !done
        });
        steps
    }
}
