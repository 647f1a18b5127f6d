pub mod trigger;

pub use trigger::{SentinelId, TriggerGate, ViewportTrigger, VisibilityEntry};
