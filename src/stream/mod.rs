// src/stream/mod.rs

pub mod inbox;
pub mod publisher;
pub mod stage;

pub use inbox::Inbox;
pub use publisher::{Publisher, Subscriber};
pub use stage::{Stage, StageControl, StageRunner, StageStats, wait_until};
