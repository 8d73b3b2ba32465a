//! Progress notifications for the presentation layer
//!
//! Components report phase transitions through a [`StatusSink`]. The default
//! sink forwards them to `tracing`; front ends can provide their own.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Phase of a session that a notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compose,
    Generate,
    Reroute,
    Discovery,
    Execute,
    Heal,
    Reflexion,
    Verify,
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Compose => "compose",
            Self::Generate => "generate",
            Self::Reroute => "reroute",
            Self::Discovery => "discovery",
            Self::Execute => "execute",
            Self::Heal => "heal",
            Self::Reflexion => "reflexion",
            Self::Verify => "verify",
            Self::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub stage: Stage,
    pub message: String,
    /// Rough completion percentage (0-100)
    pub progress: u8,
}

impl StatusUpdate {
    pub fn new(stage: Stage, message: impl Into<String>, progress: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: progress.min(100),
        }
    }
}

/// Receiver for progress notifications
pub trait StatusSink: Send + Sync {
    fn notify(&self, update: StatusUpdate);
}

/// Sink that emits notifications as tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn notify(&self, update: StatusUpdate) {
        tracing::info!(
            stage = %update.stage,
            progress = update.progress,
            "{}",
            update.message
        );
    }
}

/// Sink that keeps every notification in memory (for tests and replays)
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notifications received so far
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.updates().into_iter().map(|u| u.stage).collect()
    }
}

impl StatusSink for RecordingStatusSink {
    fn notify(&self, update: StatusUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}
