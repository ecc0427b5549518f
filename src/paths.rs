use crate::table::SampleRecord;
use std::path::{Path, PathBuf};

/// Resolve a record to its playable file under the samples root:
/// `<root>/<dir segments...>/<stem>.wav`. The table only carries the
/// segments; the root comes from config.
pub fn sample_path(samples_root: &Path, record: &SampleRecord) -> PathBuf {
    let mut path = samples_root.to_path_buf();
    for segment in &record.dir {
        path.push(segment);
    }
    path.push(format!("{}.{}", record.stem, crate::SAMPLE_EXTENSION));
    path
}
