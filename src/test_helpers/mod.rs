// Test Helpers Module - Integration Testing Infrastructure
//
// Scripted message bus and world fixtures shared by unit and integration
// tests.

pub mod scripted_messaging;
pub mod shared_test_setup;

pub use scripted_messaging::{Behavior, RecordedCall, ScriptedMessaging};
pub use shared_test_setup::{
    assignation, bay, epoch, online_platform, ps_request, settle, SharedTestSetup,
};
