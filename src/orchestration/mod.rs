//! # Orchestration
//!
//! Runtime of the tower: a single event loop that owns all mutable state.
//!
//! ## Core Components
//!
//! - **Tower**: mailbox consumer that sequences every inbound message, timer
//!   expiry, call completion and planning result
//! - **Lower**: landing protocol executor, one state machine per pit stop
//! - **Upper**: replanning trigger running the planner off the loop
//! - **Scheduler**: per-turn clock and cancellable timers
//! - **Dispatcher**: outbound calls bounded by the comms timeout
//! - **Bootstrap**: configuration, logging and observers wired around a tower

pub mod bootstrap;
pub mod dispatcher;
pub mod lower;
pub mod scheduler;
pub mod tower;
pub mod types;
pub mod upper;

pub use bootstrap::{start_tower, BootstrapConfig, SystemStatus, TowerBootstrap, TowerSystemHandle};
pub use dispatcher::{Call, CallCompletion, CallOutcome, Dispatcher};
pub use lower::Lower;
pub use scheduler::{Scheduler, TimerHandle, TimerId};
pub use tower::{Tower, TowerBuilder, TowerHandle};
pub use types::{Inbound, Inspection, LivenessChange, TimerAction, TowerEvent};
pub use upper::{planning_input, ReplanReason, Upper};
