//! Interpolation over the [`Value`] tagged union.
//! - Float / VecN / Vector: component-wise lerp
//! - Vector mixed with Float or VecN: broadcast / widen through coercion
//! - Color: Oklab blend
//! - Text: character edit script
//! - Bool: step at the midpoint
//! - Record: field-wise where both sides have the field, step otherwise
//! - List: index-wise, extra items step in
//!   Mismatched kinds hold the left value until `t >= 1`.

use cadence_api_core::{coercion, Value};
use hashbrown::HashMap;

use super::functions::{lerp_color, lerp_f32, lerp_slice, lerp_vec2, lerp_vec3, lerp_vec4, step};
use super::text::{interpolate_text, TextGranularity};

pub fn interpolate_value(a: &Value, b: &Value, t: f32) -> Value {
    match (a, b) {
        (Value::Float(af), Value::Float(bf)) => Value::Float(lerp_f32(*af, *bf, t)),
        (Value::Vec2(aa), Value::Vec2(bb)) => Value::Vec2(lerp_vec2(*aa, *bb, t)),
        (Value::Vec3(aa), Value::Vec3(bb)) => Value::Vec3(lerp_vec3(*aa, *bb, t)),
        (Value::Vec4(aa), Value::Vec4(bb)) => Value::Vec4(lerp_vec4(*aa, *bb, t)),
        (Value::Vector(va), Value::Vector(vb)) => Value::Vector(lerp_slice(va, vb, t)),

        (Value::Float(af), Value::Vector(vb)) => {
            let a_vec = vec![*af; vb.len()];
            Value::Vector(lerp_slice(&a_vec, vb, t))
        }
        (Value::Vector(va), Value::Float(bf)) => {
            let b_vec = vec![*bf; va.len()];
            Value::Vector(lerp_slice(va, &b_vec, t))
        }
        (Value::Vector(_), other) | (other, Value::Vector(_)) if other.is_numeric() => {
            Value::Vector(lerp_slice(
                &coercion::to_vector(a),
                &coercion::to_vector(b),
                t,
            ))
        }

        (Value::Color(ca), Value::Color(cb)) => Value::Color(lerp_color(ca, cb, t)),
        (Value::Text(sa), Value::Text(sb)) => {
            Value::Text(interpolate_text(sa, sb, t, TextGranularity::Char))
        }
        (Value::Bool(ba), Value::Bool(bb)) => Value::Bool(step(ba, bb, t)),

        (Value::Record(ma), Value::Record(mb)) => {
            let mut out: HashMap<String, Value> = if t < 0.5 { ma.clone() } else { mb.clone() };
            for (key, va) in ma.iter() {
                if let Some(vb) = mb.get(key) {
                    out.insert(key.clone(), interpolate_value(va, vb, t));
                }
            }
            Value::Record(out)
        }

        (Value::List(la), Value::List(lb)) => {
            let n = la.len().max(lb.len());
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                match (la.get(i), lb.get(i)) {
                    (Some(va), Some(vb)) => out.push(interpolate_value(va, vb, t)),
                    (Some(va), None) if t < 0.5 => out.push(va.clone()),
                    (None, Some(vb)) if t >= 0.5 => out.push(vb.clone()),
                    _ => {}
                }
            }
            Value::List(out)
        }

        _ => {
            if t >= 1.0 {
                b.clone()
            } else {
                a.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_api_core::Color;

    #[test]
    fn floats_and_vectors() {
        assert_eq!(
            interpolate_value(&Value::Float(0.0), &Value::Float(4.0), 0.25),
            Value::Float(1.0)
        );
        assert_eq!(
            interpolate_value(&Value::Float(2.0), &Value::Vector(vec![0.0, 4.0]), 0.5),
            Value::Vector(vec![1.0, 3.0])
        );
        assert_eq!(
            interpolate_value(&Value::Vec2([0.0, 2.0]), &Value::Vector(vec![2.0, 4.0, 6.0]), 0.5),
            Value::Vector(vec![1.0, 3.0, 3.0])
        );
    }

    #[test]
    fn record_fields_blend_independently() {
        let a = Value::record([("x", Value::Float(0.0)), ("only_a", Value::Bool(true))]);
        let b = Value::record([("x", Value::Float(10.0)), ("only_b", Value::Bool(false))]);
        let Value::Record(mid) = interpolate_value(&a, &b, 0.75) else {
            panic!("expected record");
        };
        assert_eq!(mid.get("x"), Some(&Value::Float(7.5)));
        assert!(mid.contains_key("only_b"));
        assert!(!mid.contains_key("only_a"));
    }

    #[test]
    fn mismatched_kinds_hold_left_until_end() {
        let a = Value::Color(Color::WHITE);
        let b = Value::text("done");
        assert_eq!(interpolate_value(&a, &b, 0.99), a);
        assert_eq!(interpolate_value(&a, &b, 1.0), b);
    }

    #[test]
    fn list_items_step_in() {
        let a = Value::List(vec![Value::Float(0.0)]);
        let b = Value::List(vec![Value::Float(2.0), Value::Float(5.0)]);
        assert_eq!(
            interpolate_value(&a, &b, 0.25),
            Value::List(vec![Value::Float(0.5)])
        );
        assert_eq!(
            interpolate_value(&a, &b, 0.5),
            Value::List(vec![Value::Float(1.0), Value::Float(5.0)])
        );
    }
}
