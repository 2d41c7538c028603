use super::assignation::{Assignation, Reachability};
use crate::state_machine::PsState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something that happened to a pit stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PsLogEvent {
    Assigned(Assignation),
    StateUpdate { from: PsState, to: PsState },
    ReachabilitiesUpdate(Vec<Reachability>),
    Buried,
    DroneLandedIndicationTimedOut,
}

impl PsLogEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assigned(_) => "assigned",
            Self::StateUpdate { .. } => "state_update",
            Self::ReachabilitiesUpdate(_) => "reachabilities_update",
            Self::Buried => "buried",
            Self::DroneLandedIndicationTimedOut => "drone_landed_indication_timed_out",
        }
    }
}

impl fmt::Display for PsLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned(a) => write!(f, "Assigned {a}"),
            Self::StateUpdate { from, to } => write!(f, "State {from} -> {to}"),
            Self::ReachabilitiesUpdate(reachabilities) => {
                let list: Vec<String> = reachabilities.iter().map(ToString::to_string).collect();
                write!(f, "Reachabilities [{}]", list.join(", "))
            }
            Self::Buried => write!(f, "Buried"),
            Self::DroneLandedIndicationTimedOut => write!(f, "Drone landed indication timed out"),
        }
    }
}

/// One line of a pit stop's audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsLogEntry {
    pub at: DateTime<Utc>,
    pub event: PsLogEvent,
}

impl PsLogEntry {
    pub fn new(at: DateTime<Utc>, event: PsLogEvent) -> Self {
        Self { at, event }
    }

    /// The `to` state if this entry records a transition
    pub fn new_state(&self) -> Option<PsState> {
        match self.event {
            PsLogEvent::StateUpdate { to, .. } => Some(to),
            _ => None,
        }
    }
}

impl fmt::Display for PsLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.at.to_rfc3339(), self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_line_format() {
        let at = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        let entry = PsLogEntry::new(
            at,
            PsLogEvent::StateUpdate {
                from: PsState::Requested,
                to: PsState::ReadyToSchedule,
            },
        );
        assert_eq!(
            entry.to_string(),
            "2020-01-01T12:00:00+00:00 - State REQUESTED -> READY_TO_SCHEDULE"
        );
        assert_eq!(entry.new_state(), Some(PsState::ReadyToSchedule));
    }

    #[test]
    fn test_log_event_serializes_tagged() {
        let json = serde_json::to_value(PsLogEvent::Buried).unwrap();
        assert_eq!(json["type"], "buried");
    }
}
