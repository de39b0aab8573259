//! Sync log domain types.

use serde::{Deserialize, Serialize};

/// Kind of work recorded by a sync log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncOperation {
    Sync,
    Export,
    Import,
    Cleanup,
    Aggregate,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Sync => "SYNC",
            SyncOperation::Export => "EXPORT",
            SyncOperation::Import => "IMPORT",
            SyncOperation::Cleanup => "CLEANUP",
            SyncOperation::Aggregate => "AGGREGATE",
        }
    }
}

/// Lifecycle state of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "RUNNING",
            SyncStatus::Completed => "COMPLETED",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(SyncStatus::Running),
            "COMPLETED" => Some(SyncStatus::Completed),
            "FAILED" => Some(SyncStatus::Failed),
            "CANCELLED" => Some(SyncStatus::Cancelled),
            _ => None,
        }
    }

    /// True for states that finalize a log row.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

/// Sync execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            SyncStatus::Running,
            SyncStatus::Completed,
            SyncStatus::Failed,
            SyncStatus::Cancelled,
        ] {
            assert_eq!(SyncStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(SyncStatus::parse("DONE"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SyncStatus::Running.is_terminal());
        assert!(SyncStatus::Completed.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(SyncStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_operation_strings() {
        assert_eq!(SyncOperation::Sync.as_str(), "SYNC");
        assert_eq!(SyncOperation::Aggregate.as_str(), "AGGREGATE");
    }

    #[test]
    fn test_sync_mode_display() {
        assert_eq!(SyncMode::Full.to_string(), "full");
        assert_eq!(SyncMode::Incremental.to_string(), "incremental");
    }
}
