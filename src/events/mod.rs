//! # World Events
//!
//! Observable changes of the world model. The event loop drains them in
//! order after every handled message and hands each one to the lower layer,
//! the upper layer and then every registered [`WorldListener`].

pub mod ps_file_dumper;
pub mod publisher;

pub use ps_file_dumper::PsFileDumper;
pub use publisher::{EventPublisher, PublishError, PublishedEvent};

use crate::constants::events as names;
use crate::models::{PlatformStatus, PsId, PsLogEntry, PsLogEvent};
use crate::state_machine::PsState;
use serde::{Deserialize, Serialize};
use crate::logging::{log_platform_operation, log_ps_operation};
use tracing::debug;

/// Change notification emitted by the world model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    PlatformStatusUpdated {
        old: PlatformStatus,
        current: PlatformStatus,
    },
    PitStopUpdated {
        ps_id: PsId,
        state: PsState,
    },
    PitStopLogged {
        ps_id: PsId,
        state: PsState,
        entry: PsLogEntry,
    },
}

impl WorldEvent {
    /// Published name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlatformStatusUpdated { .. } => names::PLATFORM_STATUS_UPDATED,
            Self::PitStopUpdated { .. } => names::PIT_STOP_UPDATED,
            Self::PitStopLogged { .. } => names::PIT_STOP_LOGGED,
        }
    }

    pub fn ps_id(&self) -> Option<PsId> {
        match self {
            Self::PitStopUpdated { ps_id, .. } | Self::PitStopLogged { ps_id, .. } => Some(*ps_id),
            Self::PlatformStatusUpdated { .. } => None,
        }
    }
}

/// Observer of world events. Called synchronously on the event loop.
pub trait WorldListener: Send {
    fn on_world_event(&mut self, event: &WorldEvent);
}

/// Writes every world event to the tracing subscriber
#[derive(Debug, Default)]
pub struct TracingListener;

impl WorldListener for TracingListener {
    fn on_world_event(&mut self, event: &WorldEvent) {
        match event {
            WorldEvent::PlatformStatusUpdated { old, current } => {
                let details = format!(
                    "was {}, unavailable: {}, ready PS: {:?}",
                    old.liveness,
                    current.alarms.is_unavailable(),
                    current.ready_ps_id
                );
                log_platform_operation(
                    "status_updated",
                    &current.plt_id,
                    &current.liveness.to_string(),
                    Some(&details),
                );
            }
            WorldEvent::PitStopUpdated { ps_id, state } => {
                debug!(ps_id = ps_id, state = %state, "PS updated")
            }
            WorldEvent::PitStopLogged { ps_id, state, entry } => match &entry.event {
                PsLogEvent::StateUpdate { .. } | PsLogEvent::Buried => log_ps_operation(
                    entry.event.kind(),
                    *ps_id,
                    state.as_wire_str(),
                    Some(&entry.event.to_string()),
                ),
                _ => debug!(ps_id = ps_id, "{}", entry.event),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_ps_id() {
        let event = WorldEvent::PitStopUpdated {
            ps_id: 4,
            state: PsState::Assigned,
        };
        assert_eq!(event.event_type(), "pit_stop.updated");
        assert_eq!(event.ps_id(), Some(4));

        let event = WorldEvent::PlatformStatusUpdated {
            old: PlatformStatus::offline("PLT1"),
            current: PlatformStatus::offline("PLT1"),
        };
        assert_eq!(event.event_type(), "platform.status_updated");
        assert_eq!(event.ps_id(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let event = WorldEvent::PitStopUpdated {
            ps_id: 2,
            state: PsState::LiftOff,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pit_stop_updated");
        assert_eq!(json["state"], "lift_off");
    }
}
