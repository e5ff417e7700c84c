//! cadence-api-core: Value and Color types shared by the tween engine and the
//! signal runtime (engine-agnostic, serde-friendly).

pub mod coercion;
pub mod color;
pub mod value;

pub use color::{Color, ColorParseError};
pub use value::{Value, ValueKind};
