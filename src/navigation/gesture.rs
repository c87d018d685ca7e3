//! Raw input to navigation steps. Movements under the thresholds are
//! treated as jitter and ignored.

/// Minimum wheel `deltaY` that counts as a step.
pub const WHEEL_THRESHOLD_PX: f64 = 50.0;
/// Quiet period after the last wheel event before it is acted on.
pub const WHEEL_DEBOUNCE_MS: f64 = 50.0;
/// Minimum horizontal travel of a swipe.
pub const SWIPE_MIN_DISTANCE_PX: f64 = 50.0;
/// Swipes slower than this are drags.
pub const SWIPE_MAX_DURATION_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Previous,
}

pub fn wheel_step(delta_y: f64) -> Option<Step> {
    if delta_y.abs() <= WHEEL_THRESHOLD_PX {
        return None;
    }
    Some(if delta_y > 0.0 { Step::Next } else { Step::Previous })
}

/// Keeps only the last wheel event of a burst.
#[derive(Debug, Default)]
pub struct WheelDebouncer {
    pending: Option<(f64, f64)>,
}

impl WheelDebouncer {
    pub fn push(&mut self, delta_y: f64, now_ms: f64) {
        self.pending = Some((delta_y, now_ms + WHEEL_DEBOUNCE_MS));
    }

    /// The settled delta once the burst is over.
    pub fn poll(&mut self, now_ms: f64) -> Option<f64> {
        match self.pending {
            Some((delta, due)) if due <= now_ms => {
                self.pending = None;
                Some(delta)
            }
            _ => None,
        }
    }
}

/// Tracks one touch from start to end.
#[derive(Debug, Default)]
pub struct SwipeTracker {
    start: Option<(f64, f64)>,
}

impl SwipeTracker {
    pub fn begin(&mut self, x: f64, now_ms: f64) {
        self.start = Some((x, now_ms));
    }

    /// A finger moving left advances, moving right goes back.
    pub fn end(&mut self, x: f64, now_ms: f64) -> Option<Step> {
        let (start_x, start_time) = self.start.take()?;
        let delta_x = x - start_x;
        if now_ms - start_time >= SWIPE_MAX_DURATION_MS || delta_x.abs() <= SWIPE_MIN_DISTANCE_PX {
            return None;
        }
        Some(if delta_x > 0.0 { Step::Previous } else { Step::Next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_ignores_small_deltas() {
        assert_eq!(wheel_step(30.0), None);
        assert_eq!(wheel_step(-50.0), None);
        assert_eq!(wheel_step(120.0), Some(Step::Next));
        assert_eq!(wheel_step(-80.0), Some(Step::Previous));
    }

    #[test]
    fn debouncer_keeps_the_last_delta() {
        let mut wheel = WheelDebouncer::default();
        wheel.push(10.0, 0.0);
        wheel.push(90.0, 20.0);
        assert_eq!(wheel.poll(60.0), None);
        assert_eq!(wheel.poll(70.0), Some(90.0));
        assert_eq!(wheel.poll(200.0), None);
    }

    #[test]
    fn swipes_need_distance_and_speed() {
        let mut swipe = SwipeTracker::default();
        swipe.begin(300.0, 0.0);
        assert_eq!(swipe.end(200.0, 200.0), Some(Step::Next));

        swipe.begin(100.0, 0.0);
        assert_eq!(swipe.end(180.0, 100.0), Some(Step::Previous));

        swipe.begin(100.0, 0.0);
        assert_eq!(swipe.end(130.0, 100.0), None);

        swipe.begin(100.0, 0.0);
        assert_eq!(swipe.end(300.0, 600.0), None);

        assert_eq!(swipe.end(0.0, 0.0), None);
    }
}
