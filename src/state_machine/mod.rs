// Pit stop state machine
//
// States, the events that move a pit stop between them, and the typed
// precondition failures raised when an event arrives in the wrong state.

pub mod errors;
pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{forbidden_state, unexpected_state, StateMachineError, StateMachineResult};
pub use events::PsEvent;
pub use states::PsState;
pub use transitions::determine_target_state;
