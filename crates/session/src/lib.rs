//! Client-side job tracking for the Tempest client.
//!
//! [`JobStateMachine`] is the authoritative client-side mirror of a
//! job's server status; [`JobRun`] wires channel events into it,
//! performs the exactly-once artifact fetch on completion, and exposes
//! the pull-based fallbacks used when the push channel cannot deliver.

pub mod machine;
pub mod run;

pub use machine::{Effect, JobStateMachine};
pub use run::{JobRun, RunConfig, RunEvent};
