use serde::{Deserialize, Serialize};

/// Maps linear progress in `[0, 1]` to eased progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Curve {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
    Parabolic,
}

impl Curve {
    /// Unknown names fall back to `EaseOut`.
    pub fn parse(name: &str) -> Self {
        match name {
            "linear" => Curve::Linear,
            "easeIn" => Curve::EaseIn,
            "easeOut" => Curve::EaseOut,
            "easeInOut" => Curve::EaseInOut,
            "parabolic" => Curve::Parabolic,
            other => {
                log::debug!("Unknown easing curve '{}', using easeOut", other);
                Curve::EaseOut
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Curve::Linear => "linear",
            Curve::EaseIn => "easeIn",
            Curve::EaseOut => "easeOut",
            Curve::EaseInOut => "easeInOut",
            Curve::Parabolic => "parabolic",
        }
    }

    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::EaseIn => t * t,
            Curve::EaseOut => 1.0 - (1.0 - t).powi(2),
            Curve::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Curve::Parabolic => t * t * (3.0 - 2.0 * t),
        }
    }

    /// Equivalent CSS `transition-timing-function`.
    pub fn css_timing_function(self) -> &'static str {
        match self {
            Curve::Linear => "linear",
            Curve::EaseIn => "ease-in",
            Curve::EaseOut => "ease-out",
            Curve::EaseInOut => "ease-in-out",
            Curve::Parabolic => "cubic-bezier(0.25, 0.46, 0.45, 0.94)",
        }
    }
}

impl From<String> for Curve {
    fn from(name: String) -> Self {
        Curve::parse(&name)
    }
}

impl From<Curve> for String {
    fn from(curve: Curve) -> Self {
        curve.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Curve; 5] = [
        Curve::Linear,
        Curve::EaseIn,
        Curve::EaseOut,
        Curve::EaseInOut,
        Curve::Parabolic,
    ];

    #[test]
    fn endpoints_are_fixed() {
        for curve in ALL {
            assert!(curve.apply(0.0).abs() < 1e-6, "{:?}", curve);
            assert!((curve.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", curve);
        }
    }

    #[test]
    fn midpoints_match_formulas() {
        assert!((Curve::EaseIn.apply(0.5) - 0.25).abs() < 1e-6);
        assert!((Curve::EaseOut.apply(0.5) - 0.75).abs() < 1e-6);
        assert!((Curve::EaseInOut.apply(0.25) - 0.125).abs() < 1e-6);
        assert!((Curve::Parabolic.apply(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unknown_names_default_to_ease_out() {
        assert_eq!(Curve::parse("bouncy"), Curve::EaseOut);
        let curve: Curve = serde_json::from_str("\"easeIn\"").unwrap();
        assert_eq!(curve, Curve::EaseIn);
    }

    #[test]
    fn curves_are_monotonic() {
        for curve in ALL {
            let mut last = 0.0;
            for step in 0..=20 {
                let v = curve.apply(step as f32 / 20.0);
                assert!(v >= last - 1e-6, "{:?} not monotonic at {}", curve, step);
                last = v;
            }
        }
    }
}
