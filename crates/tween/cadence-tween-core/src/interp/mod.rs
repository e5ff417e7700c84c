//! Per-kind interpolation.
//!
//! [`Tween`] is implemented for every value kind a signal can animate:
//! scalars, fixed-size vectors, variable-length vectors, colors (Oklab),
//! booleans (step), text (edit script) and the [`Value`] tagged union, which
//! dispatches on its variant.

pub mod functions;
pub mod text;
mod value;

use std::rc::Rc;

use cadence_api_core::{Color, Value};

use self::functions::{lerp_color, lerp_f32, lerp_f64, lerp_slice, lerp_vec2, lerp_vec3, lerp_vec4};

pub use self::value::interpolate_value;

/// Interpolation between two values of the same kind.
///
/// `t` is eased progress; it may leave `[0, 1]` for overshooting curves.
/// Implementations must return `self` at `t == 0` and `other` at `t == 1`.
pub trait Tween: Clone {
    fn interpolate(&self, other: &Self, t: f32) -> Self;

    /// Interpolator handed to one animation. Kinds with per-pair setup cost
    /// override this to cache that setup across frames.
    fn tween_fn() -> TweenFn<Self>
    where
        Self: Sized + 'static,
    {
        Rc::new(|a: &Self, b: &Self, t: f32| a.interpolate(b, t))
    }
}

/// Shared interpolator: `(from, to, eased_progress)`.
pub type TweenFn<T> = Rc<dyn Fn(&T, &T, f32) -> T>;

/// Free-function form of [`Tween::interpolate`], usable as an interpolator
/// function pointer.
#[inline]
pub fn interpolate<T: Tween>(a: &T, b: &T, t: f32) -> T {
    a.interpolate(b, t)
}

impl Tween for f32 {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_f32(*self, *other, t)
    }
}

impl Tween for f64 {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_f64(*self, *other, t)
    }
}

impl Tween for [f32; 2] {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_vec2(*self, *other, t)
    }
}

impl Tween for [f32; 3] {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_vec3(*self, *other, t)
    }
}

impl Tween for [f32; 4] {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_vec4(*self, *other, t)
    }
}

impl Tween for Vec<f32> {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_slice(self, other, t)
    }
}

impl Tween for bool {
    #[inline]
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        functions::step(self, other, t)
    }
}

impl Tween for Color {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp_color(self, other, t)
    }
}

impl Tween for String {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        text::tween_text_chars(self, other, t)
    }

    fn tween_fn() -> TweenFn<Self> {
        Rc::new(text::cached_tween(text::TextGranularity::Char))
    }
}

impl Tween for Value {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        interpolate_value(self, other, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_lerp_componentwise() {
        assert_eq!(interpolate(&[0.0, 10.0], &[10.0, 20.0], 0.5), [5.0, 15.0]);
        assert_eq!(
            interpolate(&[0.0, 0.0, 0.0, 0.0], &[4.0, 8.0, 12.0, 16.0], 0.25),
            [1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn string_tween_fn_matches_interpolate() {
        let f = String::tween_fn();
        let (a, b) = ("kitten".to_string(), "sitting".to_string());
        for t in [0.0, 0.3, 0.5, 0.8, 1.0] {
            assert_eq!(f(&a, &b, t), a.interpolate(&b, t));
        }
    }

    #[test]
    fn overshoot_extrapolates() {
        assert_eq!(0.0f32.interpolate(&10.0, 1.5), 15.0);
    }
}
