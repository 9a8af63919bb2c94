//! Tunables for the sync service and the server.

use serde::{Deserialize, Serialize};

/// Service (client replica) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Undo entries kept after a cleanup.
    pub history_size_limit: usize,
    /// Slack allowed past a limit before a batch cleanup runs.
    pub array_cleanup_threshold: usize,
    /// View deltas kept after a cleanup.
    pub view_log_limit: usize,
    /// Out-of-order messages buffered; past this the newest are dropped.
    pub message_queue_limit: usize,
    /// Seed the undo stack with a pointer into server history on reset,
    /// so edits from earlier sessions stay undoable.
    pub undo_server_history: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            history_size_limit: 100,
            array_cleanup_threshold: 20,
            view_log_limit: 100,
            message_queue_limit: 1000,
            undo_server_history: false,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Records kept in memory after the tail is advanced.
    pub record_retention_limit: usize,
    /// Slack allowed past the retention limit before compaction runs.
    pub cleanup_threshold: usize,
    /// Broadcast channel capacity per document.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            record_retention_limit: 1000,
            cleanup_threshold: 100,
            broadcast_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Small limits so tests exercise compaction quickly.
    pub fn for_testing() -> Self {
        Self {
            record_retention_limit: 8,
            cleanup_threshold: 4,
            broadcast_capacity: 64,
        }
    }
}
