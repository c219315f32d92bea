//! On-Call Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the simulation kernel run
//! against the **Production** system clock or a **Simulation** clock that only
//! moves when a test or script tells it to.
//!
//! # Core Concept
//!
//! The kernel is deterministic except for two inputs:
//! - Time (`wall_time()`), read by the hybrid session clock
//! - Entropy (`derive_id()`), used to name notes, results and events
//!
//! Both are intercepted here. A simulation context derives all ids from a
//! single 64-bit seed, so any timeline is reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use oncall_env::{SimulationContext, SystemContext};
//!
//! let ctx = SystemContext::shared();
//! let started = ctx.wall_time();
//! let note_id = ctx.derive_id("note");
//! ```

mod context;
mod system_impl;
mod types;

pub use context::SimulationContext;
pub use system_impl::SystemContext;
pub use types::{PatientId, SessionId};
