use crate::models::{GrafanaSeverity, Severity};

/// Map an internal severity onto the Grafana IRM scale
pub fn map_severity(severity: Severity) -> GrafanaSeverity {
    match severity {
        Severity::P1 => GrafanaSeverity::Critical,
        Severity::P2 => GrafanaSeverity::Major,
        Severity::P3 => GrafanaSeverity::Minor,
        Severity::P4 => GrafanaSeverity::Minor,
    }
}

impl From<Severity> for GrafanaSeverity {
    fn from(severity: Severity) -> Self {
        map_severity(severity)
    }
}
