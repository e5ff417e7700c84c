//! Coercion helpers between Value kinds.
//! Used when two endpoints of a tween disagree on layout: a scalar or vecN
//! meeting a variable-length Vector is widened to a Vector first.

use crate::Value;

/// Convert a Value into a Vec<f32> (generic vector).
/// - VecN -> vector of components
/// - Float -> single-element vec
/// - Bool -> single 0/1
/// - Color -> [r, g, b, a]
/// - Vector -> clone
/// - List -> flattened items
/// - Record/Text -> empty; record iteration order is unspecified
pub fn to_vector(v: &Value) -> Vec<f32> {
    match v {
        Value::Float(f) => vec![*f],
        Value::Bool(b) => vec![if *b { 1.0 } else { 0.0 }],
        Value::Vec2(a) => a.to_vec(),
        Value::Vec3(a) => a.to_vec(),
        Value::Vec4(a) => a.to_vec(),
        Value::Color(c) => vec![c.r, c.g, c.b, c.a],
        Value::Vector(vec) => vec.clone(),
        Value::List(items) => items.iter().flat_map(to_vector).collect(),
        Value::Record(_) | Value::Text(_) => vec![],
    }
}
