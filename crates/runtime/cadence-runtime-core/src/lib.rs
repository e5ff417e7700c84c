//! cadence-runtime
//!
//! Reactive signals and a cooperative task scheduler for time-based
//! animation. The host owns a [`Scheduler`] and calls [`Scheduler::tick`]
//! once per frame; tasks animate [`Signal`]s, [`Computed`] values derive
//! from them, and the host reads the results after each tick.
//!
//! ```no_run
//! use cadence_runtime::{flow, Config, Easing, Routine, Scheduler};
//!
//! let mut scheduler = Scheduler::new(Config::default());
//! let rt = scheduler.runtime();
//! let x = rt.signal(0.0f32);
//! let label = x.map(|v| format!("{v:.0}%"));
//!
//! let intro = flow::sequence(
//!     0.5,
//!     [
//!         x.animate_to(100.0, 2.0, Easing::CubicInOut).unwrap().boxed(),
//!         flow::wait_for(1.0).unwrap().boxed(),
//!     ],
//! )
//! .unwrap();
//! scheduler.spawn(intro);
//! while scheduler.tick(1.0 / 60.0) {
//!     let _ = label.get();
//! }
//! ```

pub mod animate;
pub mod computed;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod ids;
pub mod runtime;
pub mod scheduler;
pub mod signal;
pub mod task;
mod tracker;

pub use cadence_api_core::{Color, Value};
pub use cadence_tween_core::{Easing, Tween};

pub use crate::animate::Animate;
pub use crate::computed::Computed;
pub use crate::config::Config;
pub use crate::context::TaskContext;
pub use crate::diagnostics::TickReport;
pub use crate::error::RuntimeError;
pub use crate::ids::{NodeId, TaskId};
pub use crate::runtime::{Clock, Runtime};
pub use crate::scheduler::Scheduler;
pub use crate::signal::{Interpolator, Signal};
pub use crate::task::{
    external, from_fn, named_fn, External, FnRoutine, Resolver, Routine, Step, Suspend,
    TaskOutcome, TaskState,
};
