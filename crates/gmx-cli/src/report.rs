//! Drop report export.

use std::path::Path;

use anyhow::{Context, Result};
use gmx_core::DropReport;

/// Write one `label,sample` line per dropped sample.
pub fn write_drop_report(report: &DropReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(["label", "sample"])?;
    for (label, samples) in report.iter() {
        for sample in samples {
            writer.write_record([label, sample.as_str()])?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
