//! Uniform values and the small value DSL shared by shader uniforms and CSS
//! reactions: `"*=2"` multiplies, `"+=0.5"` adds, `"initial"` resets and
//! anything else is a literal number or a raw string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A live uniform value: a float or a float vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UniformValue {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl UniformValue {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            UniformValue::Scalar(v) => Some(*v),
            UniformValue::Vector(_) => None,
        }
    }

    pub fn components(&self) -> &[f32] {
        match self {
            UniformValue::Scalar(v) => std::slice::from_ref(v),
            UniformValue::Vector(v) => v,
        }
    }

    /// Applies `f` component-wise. A scalar `other` is broadcast over a vector `self`.
    fn zip_with(&self, other: &UniformValue, f: impl Fn(f32, f32) -> f32) -> UniformValue {
        match (self, other) {
            (UniformValue::Scalar(a), UniformValue::Scalar(b)) => UniformValue::Scalar(f(*a, *b)),
            (UniformValue::Vector(a), UniformValue::Scalar(b)) => {
                UniformValue::Vector(a.iter().map(|a| f(*a, *b)).collect())
            }
            (UniformValue::Scalar(a), UniformValue::Vector(b)) => {
                UniformValue::Vector(b.iter().map(|b| f(*a, *b)).collect())
            }
            (UniformValue::Vector(a), UniformValue::Vector(b)) => UniformValue::Vector(
                a.iter()
                    .zip(b.iter().chain(std::iter::repeat(&0.0)))
                    .map(|(a, b)| f(*a, *b))
                    .collect(),
            ),
        }
    }

    /// `self + (target - self) * t`
    pub fn lerp(&self, target: &UniformValue, t: f32) -> UniformValue {
        match (self, target) {
            (UniformValue::Scalar(a), UniformValue::Scalar(b)) => UniformValue::Scalar(a + (b - a) * t),
            _ => {
                let delta = target.zip_with(self, |b, a| b - a);
                self.zip_with(&delta, |a, d| a + d * t)
            }
        }
    }

    pub fn clamp(&self, min: f32, max: f32) -> UniformValue {
        match self {
            UniformValue::Scalar(v) => UniformValue::Scalar(v.clamp(min, max)),
            UniformValue::Vector(v) => UniformValue::Vector(v.iter().map(|c| c.clamp(min, max)).collect()),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Scalar(v)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::Vector(v)
    }
}

impl fmt::Display for UniformValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformValue::Scalar(v) => write!(f, "{}", v),
            UniformValue::Vector(v) => write!(f, "{:?}", v),
        }
    }
}

/// Operation tag of a target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Add,
    Multiply,
    Reset,
}

/// A target value descriptor as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawValue", into = "RawValue")]
pub enum ValueDescriptor {
    Set(f32),
    Add(f32),
    Multiply(f32),
    Reset,
    /// Not numeric; only meaningful for CSS properties.
    Raw(String),
}

/// JSON shape of a target value: a bare number or a DSL string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl ValueDescriptor {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("*=") {
            match rest.trim().parse::<f32>() {
                Ok(v) => return ValueDescriptor::Multiply(v),
                Err(_) => log::warn!("Malformed multiply value '{}'", text),
            }
        } else if let Some(rest) = text.strip_prefix("+=") {
            match rest.trim().parse::<f32>() {
                Ok(v) => return ValueDescriptor::Add(v),
                Err(_) => log::warn!("Malformed add value '{}'", text),
            }
        } else if text == "initial" {
            return ValueDescriptor::Reset;
        } else if let Ok(v) = text.parse::<f32>() {
            return ValueDescriptor::Set(v);
        }
        ValueDescriptor::Raw(text.to_string())
    }

    pub fn operation(&self) -> Operation {
        match self {
            ValueDescriptor::Set(_) | ValueDescriptor::Raw(_) => Operation::Set,
            ValueDescriptor::Add(_) => Operation::Add,
            ValueDescriptor::Multiply(_) => Operation::Multiply,
            ValueDescriptor::Reset => Operation::Reset,
        }
    }

    /// Resolves a numeric target against the current and baseline values.
    /// `Raw` has no numeric meaning and yields `None`.
    pub fn resolve(&self, current: f32, baseline: f32) -> Option<f32> {
        match self {
            ValueDescriptor::Set(v) => Some(*v),
            ValueDescriptor::Add(v) => Some(current + v),
            ValueDescriptor::Multiply(v) => Some(current * v),
            ValueDescriptor::Reset => Some(baseline),
            ValueDescriptor::Raw(_) => None,
        }
    }

    /// Same as [`resolve`](Self::resolve) for scalar or vector uniforms.
    pub fn resolve_uniform(&self, current: &UniformValue, baseline: &UniformValue) -> Option<UniformValue> {
        match self {
            ValueDescriptor::Set(v) => Some(current.zip_with(&UniformValue::Scalar(*v), |_, b| b)),
            ValueDescriptor::Add(v) => Some(current.zip_with(&UniformValue::Scalar(*v), |a, b| a + b)),
            ValueDescriptor::Multiply(v) => Some(current.zip_with(&UniformValue::Scalar(*v), |a, b| a * b)),
            ValueDescriptor::Reset => Some(baseline.clone()),
            ValueDescriptor::Raw(_) => None,
        }
    }
}

impl From<RawValue> for ValueDescriptor {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Number(v) => ValueDescriptor::Set(v as f32),
            RawValue::Text(text) => ValueDescriptor::parse(&text),
        }
    }
}

impl From<ValueDescriptor> for RawValue {
    fn from(value: ValueDescriptor) -> Self {
        match value {
            ValueDescriptor::Set(v) => RawValue::Number(v as f64),
            ValueDescriptor::Add(v) => RawValue::Text(format!("+={}", v)),
            ValueDescriptor::Multiply(v) => RawValue::Text(format!("*={}", v)),
            ValueDescriptor::Reset => RawValue::Text("initial".to_string()),
            ValueDescriptor::Raw(text) => RawValue::Text(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dsl() {
        assert_eq!(ValueDescriptor::parse("*=2"), ValueDescriptor::Multiply(2.0));
        assert_eq!(ValueDescriptor::parse("+=0.5"), ValueDescriptor::Add(0.5));
        assert_eq!(ValueDescriptor::parse("+=-1"), ValueDescriptor::Add(-1.0));
        assert_eq!(ValueDescriptor::parse("initial"), ValueDescriptor::Reset);
        assert_eq!(ValueDescriptor::parse("1.2"), ValueDescriptor::Set(1.2));
        assert_eq!(ValueDescriptor::parse("10px"), ValueDescriptor::Raw("10px".into()));
        assert_eq!(ValueDescriptor::parse("*=lots"), ValueDescriptor::Raw("*=lots".into()));
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let values: Vec<ValueDescriptor> = serde_json::from_str(r#"[1.5, "*=3", "red"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ValueDescriptor::Set(1.5),
                ValueDescriptor::Multiply(3.0),
                ValueDescriptor::Raw("red".into())
            ]
        );
    }

    #[test]
    fn resolves_operations() {
        assert_eq!(ValueDescriptor::Multiply(2.0).resolve(3.0, 1.0), Some(6.0));
        assert_eq!(ValueDescriptor::Add(0.5).resolve(3.0, 1.0), Some(3.5));
        assert_eq!(ValueDescriptor::Reset.resolve(3.0, 1.0), Some(1.0));
        assert_eq!(ValueDescriptor::Set(9.0).resolve(3.0, 1.0), Some(9.0));
        assert_eq!(ValueDescriptor::Raw("x".into()).resolve(3.0, 1.0), None);
    }

    #[test]
    fn vector_operations_are_componentwise() {
        let current = UniformValue::Vector(vec![1.0, 2.0]);
        let baseline = UniformValue::Vector(vec![0.0, 0.0]);
        assert_eq!(
            ValueDescriptor::Multiply(2.0).resolve_uniform(&current, &baseline),
            Some(UniformValue::Vector(vec![2.0, 4.0]))
        );
        assert_eq!(
            ValueDescriptor::Set(0.5).resolve_uniform(&current, &baseline),
            Some(UniformValue::Vector(vec![0.5, 0.5]))
        );
        assert_eq!(
            ValueDescriptor::Set(0.5).resolve_uniform(&UniformValue::Scalar(3.0), &baseline),
            Some(UniformValue::Scalar(0.5))
        );
        let halfway = current.lerp(&UniformValue::Vector(vec![3.0, 4.0]), 0.5);
        assert_eq!(halfway, UniformValue::Vector(vec![2.0, 3.0]));
    }

    #[test]
    fn uniform_values_deserialize_untagged() {
        let scalar: UniformValue = serde_json::from_str("4.0").unwrap();
        let vector: UniformValue = serde_json::from_str("[800, 600]").unwrap();
        assert_eq!(scalar, UniformValue::Scalar(4.0));
        assert_eq!(vector, UniformValue::Vector(vec![800.0, 600.0]));
    }
}
