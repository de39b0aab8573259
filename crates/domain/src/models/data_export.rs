//! Data export domain types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Pending => "PENDING",
            ExportStatus::Processing => "PROCESSING",
            ExportStatus::Completed => "COMPLETED",
            ExportStatus::Failed => "FAILED",
            ExportStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ExportStatus::Pending),
            "PROCESSING" => Some(ExportStatus::Processing),
            "COMPLETED" => Some(ExportStatus::Completed),
            "FAILED" => Some(ExportStatus::Failed),
            "EXPIRED" => Some(ExportStatus::Expired),
            _ => None,
        }
    }

    /// States an overdue export may be expired from.
    pub fn is_expirable(&self) -> bool {
        matches!(
            self,
            ExportStatus::Pending | ExportStatus::Processing | ExportStatus::Completed
        )
    }
}

/// Supported export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Xlsx => "XLSX",
            ExportFormat::Pdf => "PDF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CSV" => Some(ExportFormat::Csv),
            "JSON" => Some(ExportFormat::Json),
            "XLSX" => Some(ExportFormat::Xlsx),
            "PDF" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            ExportStatus::Pending,
            ExportStatus::Processing,
            ExportStatus::Completed,
            ExportStatus::Failed,
            ExportStatus::Expired,
        ] {
            assert_eq!(ExportStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_expirable_states() {
        assert!(ExportStatus::Pending.is_expirable());
        assert!(ExportStatus::Completed.is_expirable());
        assert!(!ExportStatus::Failed.is_expirable());
        assert!(!ExportStatus::Expired.is_expirable());
    }

    #[test]
    fn test_format_round_trip() {
        for f in [
            ExportFormat::Csv,
            ExportFormat::Json,
            ExportFormat::Xlsx,
            ExportFormat::Pdf,
        ] {
            assert_eq!(ExportFormat::parse(f.as_str()), Some(f));
        }
        assert_eq!(ExportFormat::parse("YAML"), None);
    }

    #[test]
    fn test_default_format() {
        assert_eq!(ExportFormat::default(), ExportFormat::Csv);
    }
}
