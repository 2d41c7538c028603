pub mod assignation;
pub mod pit_stop;
pub mod platform;
pub mod ps_log;

/// Pit stop identifier, assigned by the tower
pub type PsId = u32;
/// Bay identifier, unique within a platform
pub type BayId = u32;
/// Platform agent name
pub type PlatformId = String;
/// Mission controller agent name
pub type McId = String;

// Re-export core models for easy access
pub use assignation::{Assignation, Reachability};
pub use pit_stop::{
    PendingKind, PitStop, PitStopBuilder, PitStopView, PsRequest, PsTimer, Responder,
};
pub use platform::{
    GeoCoord, Liveness, PayloadBay, PlatformAlarms, PlatformStatus, RestoringPayload,
};
pub use ps_log::{PsLogEntry, PsLogEvent};
