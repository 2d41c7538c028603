#![allow(clippy::doc_markdown)] // Allow technical terms like MC, PS in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Pit Stop Tower
//!
//! Coordinator of a drone fleet's battery and payload swaps.
//!
//! ## Overview
//!
//! Mission controllers (MCs) ask the tower for a pit stop when a drone needs
//! a fresh payload. The tower picks a platform bay and an arrival time, tells
//! the platform when to prepare, authorizes the landing, relays touchdown and
//! completion between the parties and cleans up when anything goes wrong.
//!
//! ## Architecture
//!
//! - **Lower layer**: one protocol state machine per pit stop, driven by
//!   remote messages, timers and call outcomes
//! - **Upper layer**: replans whenever the set of plannable pit stops or the
//!   platforms change, off the event loop
//! - **World model**: single owner of platform statuses and pit stops,
//!   publishing every change in order
//!
//! All of it runs on one event loop task; the rest of the process talks to
//! it through a [`TowerHandle`].
//!
//! ## Module Organization
//!
//! - [`models`] - Pit stops, platforms, assignations and audit log entries
//! - [`state_machine`] - Pit stop states, events and transitions
//! - [`planning`] - Interval algebra, planner and plan application
//! - [`world`] - World model and change notifications
//! - [`orchestration`] - Event loop, protocol layers, timers and calls
//! - [`messaging`] - Protocol payloads and the outbound bus interface
//! - [`events`] - World events and their observers
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pitstop_tower::orchestration::start_tower;
//! use pitstop_tower::test_helpers::ScriptedMessaging;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut system = start_tower(Arc::new(ScriptedMessaging::new())).await?;
//! let platforms = system.tower.platforms().await?;
//! println!("{} platforms known", platforms.len());
//! system.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod planning;
pub mod state_machine;
pub mod test_helpers;
pub mod utils;
pub mod world;

pub use config::{ConfigManager, TowerConfig};
pub use error::{Result, TowerError};
pub use events::{EventPublisher, WorldEvent, WorldListener};
pub use messaging::{OutboundMessage, Reply, TowerMessaging};
pub use models::{PitStop, PitStopView, PlatformStatus, PsId};
pub use orchestration::{start_tower, TowerBuilder, TowerHandle};
pub use planning::{DummyPlanner, Plan, Planner};
pub use state_machine::{PsEvent, PsState};
pub use world::WorldModel;
