//! cadence-tween-core: easing curves and per-kind interpolation.
//!
//! Pure functions only: `(start, end, progress, easing) -> value`. The signal
//! runtime decides *when* progress advances; this crate decides *how* values
//! move between endpoints.

pub mod easing;
pub mod interp;

pub use easing::Easing;
pub use interp::text::{diff as text_diff, interpolate_text, TextEdit, TextGranularity, TextMorph};
pub use interp::{interpolate, interpolate_value, Tween, TweenFn};

/// Ease linear progress and interpolate in one call.
pub fn tween<T: Tween>(from: &T, to: &T, progress: f32, easing: Easing) -> T {
    from.interpolate(to, easing.apply(progress))
}
