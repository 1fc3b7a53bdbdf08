//! swell-control — the control-loop supervisor and its loops.
//!
//! The moving parts, bottom up:
//!
//! - [`ScaleAction`] applies a desired replica count to the workload,
//!   either writing replicas directly or pinning the workload's HPA
//!   bounds, through the [`ScaleExecutor`] trait.
//! - [`ControlLoop`] runs one workload's collect → decide → apply cycle
//!   on a fixed interval until cancelled or failed.
//! - [`ControlLoopFactory`] turns a raw configuration entry into a
//!   fully wired loop, dispatching on the entry's backend tag.
//! - [`Supervisor`] owns the loop set: it rebuilds all loops from a
//!   fresh configuration read whenever the source signals a change, and
//!   treats the first loop failure as fatal for the whole process.

pub mod control_loop;
pub mod factory;
pub mod scale;
pub mod supervisor;

pub use control_loop::{ControlLoop, LoopError};
pub use factory::{ControlLoopFactory, FactoryError};
pub use scale::{ScaleAction, ScaleExecutor};
pub use supervisor::{Supervisor, SupervisorError};
