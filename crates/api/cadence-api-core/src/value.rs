//! Value: the closed set of property kinds a signal can carry when the host
//! does not know the concrete Rust type up front (payloads, task results,
//! fixtures). All numeric types use f32.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Lightweight kind enum for pattern-matching and quick dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Text,
    Vector,
    Record,
    List,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// Boolean (step)
    Bool(bool),

    /// 2D vector
    Vec2([f32; 2]),

    /// 3D vector
    Vec3([f32; 3]),

    /// 4D vector
    Vec4([f32; 4]),

    /// sRGB color with straight alpha
    Color(Color),

    /// Text; interpolated through an edit script, not component-wise
    Text(String),

    /// Generic, variable-length numeric vector
    Vector(Vec<f32>),

    /// Named fields, interpolated field-wise
    Record(HashMap<String, Value>),

    /// Ordered items, interpolated index-wise
    List(Vec<Value>),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Color(_) => ValueKind::Color,
            Value::Text(_) => ValueKind::Text,
            Value::Vector(_) => ValueKind::Vector,
            Value::Record(_) => ValueKind::Record,
            Value::List(_) => ValueKind::List,
        }
    }

    /// True for kinds whose interpolation is a per-component lerp.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.kind(),
            ValueKind::Float | ValueKind::Vec2 | ValueKind::Vec3 | ValueKind::Vec4 | ValueKind::Vector
        )
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec2(x: f32, y: f32) -> Self {
        Value::Vec2([x, y])
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<[f32; 2]> for Value {
    fn from(v: [f32; 2]) -> Self {
        Value::Vec2(v)
    }
}

impl From<[f32; 3]> for Value {
    fn from(v: [f32; 3]) -> Self {
        Value::Vec3(v)
    }
}

impl From<[f32; 4]> for Value {
    fn from(v: [f32; 4]) -> Self {
        Value::Vec4(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
