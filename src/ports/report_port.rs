//! Presentation hand-off port.

use crate::domain::analysis::AnalysisReport;
use crate::domain::error::FolioError;
use std::path::Path;

/// Receives the finished report; all formatting is the implementor's concern.
pub trait ReportPort {
    fn write(&self, report: &AnalysisReport, output_dir: &Path) -> Result<(), FolioError>;
}
