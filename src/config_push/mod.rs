//! Chunked configuration push
//!
//! Delivers a payload larger than one transaction through a staging buffer:
//! `begin(version)`, one `write` per chunk in order, then `commit`. Each step
//! waits for finality before the next is built; nothing is pipelined.

mod chunks;
pub mod errors;
mod protocol;

pub use chunks::split_config;
pub use errors::{ConfigPushError, PushStep};
pub use protocol::{ConfigInstructionSet, ConfigPush, PushPhase, PushReport};
