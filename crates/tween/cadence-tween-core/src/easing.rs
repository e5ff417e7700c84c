//! Easing curves: map linear progress in `[0, 1]` to eased progress.
//!
//! Every curve returns exactly `0.0` at `t <= 0` and exactly `1.0` at `t >= 1`.
//! Between the endpoints, results are clamped to `[0, 1]` except for curves
//! that overshoot on purpose (`Back*`, `Elastic*`, and Bezier curves whose
//! control points leave the unit square).

use std::f32::consts::PI;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};

/// A named easing curve, a cubic Bezier timing curve, or a custom function.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Easing {
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    QuintInOut,
    SineIn,
    SineOut,
    SineInOut,
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    CircIn,
    CircOut,
    CircInOut,
    ElasticIn,
    ElasticOut,
    ElasticInOut,
    BackIn,
    BackOut,
    BackInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
    /// CSS-style `cubic-bezier(x1, y1, x2, y2)`.
    Bezier(f32, f32, f32, f32),
    Custom(fn(f32) -> f32),
}

impl Default for Easing {
    fn default() -> Self {
        Easing::CubicInOut
    }
}

const BACK_C1: f32 = 1.701_58;
const BACK_C2: f32 = BACK_C1 * 1.525;
const BACK_C3: f32 = BACK_C1 + 1.0;
const ELASTIC_C4: f32 = (2.0 * PI) / 3.0;
const ELASTIC_C5: f32 = (2.0 * PI) / 4.5;

impl Easing {
    /// The closed set of named curves, in declaration order.
    pub const NAMED: [Easing; 31] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::QuartIn,
        Easing::QuartOut,
        Easing::QuartInOut,
        Easing::QuintIn,
        Easing::QuintOut,
        Easing::QuintInOut,
        Easing::SineIn,
        Easing::SineOut,
        Easing::SineInOut,
        Easing::ExpoIn,
        Easing::ExpoOut,
        Easing::ExpoInOut,
        Easing::CircIn,
        Easing::CircOut,
        Easing::CircInOut,
        Easing::ElasticIn,
        Easing::ElasticOut,
        Easing::ElasticInOut,
        Easing::BackIn,
        Easing::BackOut,
        Easing::BackInOut,
        Easing::BounceIn,
        Easing::BounceOut,
        Easing::BounceInOut,
    ];

    /// Get the name of this curve (`"custom"` for function curves).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::QuadIn => "quad-in",
            Self::QuadOut => "quad-out",
            Self::QuadInOut => "quad-in-out",
            Self::CubicIn => "cubic-in",
            Self::CubicOut => "cubic-out",
            Self::CubicInOut => "cubic-in-out",
            Self::QuartIn => "quart-in",
            Self::QuartOut => "quart-out",
            Self::QuartInOut => "quart-in-out",
            Self::QuintIn => "quint-in",
            Self::QuintOut => "quint-out",
            Self::QuintInOut => "quint-in-out",
            Self::SineIn => "sine-in",
            Self::SineOut => "sine-out",
            Self::SineInOut => "sine-in-out",
            Self::ExpoIn => "expo-in",
            Self::ExpoOut => "expo-out",
            Self::ExpoInOut => "expo-in-out",
            Self::CircIn => "circ-in",
            Self::CircOut => "circ-out",
            Self::CircInOut => "circ-in-out",
            Self::ElasticIn => "elastic-in",
            Self::ElasticOut => "elastic-out",
            Self::ElasticInOut => "elastic-in-out",
            Self::BackIn => "back-in",
            Self::BackOut => "back-out",
            Self::BackInOut => "back-in-out",
            Self::BounceIn => "bounce-in",
            Self::BounceOut => "bounce-out",
            Self::BounceInOut => "bounce-in-out",
            Self::Bezier(..) => "cubic-bezier",
            Self::Custom(_) => "custom",
        }
    }

    /// Look up a named curve, ignoring case and `-` / `_` separators
    /// (`"cubic-in-out"`, `"Cubic_In_Out"`), or parse
    /// `cubic-bezier(x1, y1, x2, y2)`.
    pub fn from_name(name: &str) -> Option<Easing> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        if let Some(args) = normalized
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<f32> = args
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .ok()?;
            return match parts.as_slice() {
                [x1, y1, x2, y2] => Some(Easing::Bezier(*x1, *y1, *x2, *y2)),
                _ => None,
            };
        }
        let compact = normalized.replace('-', "");
        Self::NAMED
            .iter()
            .copied()
            .find(|e| e.name().replace('-', "") == compact)
    }

    /// Whether the curve may leave `[0, 1]` between the endpoints.
    pub fn overshoots(&self) -> bool {
        match self {
            Self::ElasticIn
            | Self::ElasticOut
            | Self::ElasticInOut
            | Self::BackIn
            | Self::BackOut
            | Self::BackInOut
            | Self::Custom(_) => true,
            Self::Bezier(_, y1, _, y2) => !(0.0..=1.0).contains(y1) || !(0.0..=1.0).contains(y2),
            _ => false,
        }
    }

    /// Apply the curve to linear progress `t`.
    pub fn apply(&self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        let eased = self.raw(t);
        if self.overshoots() {
            eased
        } else {
            eased.clamp(0.0, 1.0)
        }
    }

    fn raw(&self, t: f32) -> f32 {
        match *self {
            Self::Linear => t,
            Self::QuadIn => t * t,
            Self::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Self::CubicIn => t * t * t,
            Self::CubicOut => 1.0 - (1.0 - t).powi(3),
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::QuartIn => t.powi(4),
            Self::QuartOut => 1.0 - (1.0 - t).powi(4),
            Self::QuartInOut => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Self::QuintIn => t.powi(5),
            Self::QuintOut => 1.0 - (1.0 - t).powi(5),
            Self::QuintInOut => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
                }
            }
            Self::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Self::SineOut => (t * PI / 2.0).sin(),
            Self::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Self::ExpoIn => 2f32.powf(10.0 * t - 10.0),
            Self::ExpoOut => 1.0 - 2f32.powf(-10.0 * t),
            Self::ExpoInOut => {
                if t < 0.5 {
                    2f32.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f32.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Self::CircIn => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Self::CircOut => (1.0 - (t - 1.0) * (t - 1.0)).max(0.0).sqrt(),
            Self::CircInOut => {
                if t < 0.5 {
                    (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Self::ElasticIn => {
                -(2f32.powf(10.0 * t - 10.0)) * ((10.0 * t - 10.75) * ELASTIC_C4).sin()
            }
            Self::ElasticOut => {
                2f32.powf(-10.0 * t) * ((10.0 * t - 0.75) * ELASTIC_C4).sin() + 1.0
            }
            Self::ElasticInOut => {
                if t < 0.5 {
                    -(2f32.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0
                } else {
                    (2f32.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0
                        + 1.0
                }
            }
            Self::BackIn => BACK_C3 * t * t * t - BACK_C1 * t * t,
            Self::BackOut => {
                1.0 + BACK_C3 * (t - 1.0).powi(3) + BACK_C1 * (t - 1.0).powi(2)
            }
            Self::BackInOut => {
                if t < 0.5 {
                    ((2.0 * t).powi(2) * ((BACK_C2 + 1.0) * 2.0 * t - BACK_C2)) / 2.0
                } else {
                    ((2.0 * t - 2.0).powi(2) * ((BACK_C2 + 1.0) * (t * 2.0 - 2.0) + BACK_C2)
                        + 2.0)
                        / 2.0
                }
            }
            Self::BounceIn => 1.0 - bounce_out(1.0 - t),
            Self::BounceOut => bounce_out(t),
            Self::BounceInOut => {
                if t < 0.5 {
                    (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
                } else {
                    (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
                }
            }
            Self::Bezier(x1, y1, x2, y2) => bezier_ease_t(t, x1, y1, x2, y2),
            Self::Custom(f) => f(t),
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984_375
    }
}

/// Cubic Bezier basis function
#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Given control points (x1, y1, x2, y2) and an input t in [0,1],
/// compute the eased y by inverting the x bezier via binary search.
fn bezier_ease_t(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    // Bezier(0,0,1,1) is exactly linear
    if x1 == 0.0 && y1 == 0.0 && x2 == 1.0 && y2 == 1.0 {
        return t;
    }
    // Monotonic X in [0,1] assumed for x1/x2 ∈ [0,1]
    let x1 = x1.clamp(0.0, 1.0);
    let x2 = x2.clamp(0.0, 1.0);
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = t;
    for _ in 0..24 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bezier(x1, y1, x2, y2) => write!(f, "cubic-bezier({x1}, {y1}, {x2}, {y2})"),
            other => f.write_str(other.name()),
        }
    }
}

impl Serialize for Easing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Custom(_) => Err(ser::Error::custom(
                "custom easing functions cannot be serialized",
            )),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Easing::from_name(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown easing curve '{name}'")))
    }
}
