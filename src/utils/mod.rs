pub mod time;

pub use time::{from_millis, to_std};
