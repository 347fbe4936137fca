use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::NamedTempFile;

/// Write an artifact through the given closure and atomically move it into
/// place afterwards. The temporary file lives in the destination directory
/// so that the final rename cannot cross filesystems; on any error the
/// temporary file is dropped and no partial artifact remains at `path`.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.persist(path)?;

    Ok(())
}

/// Missing-value spellings found in MAF exports.
pub(crate) fn is_missing(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || field == "NA" || field == "NaN" || field == "nan" || field == "."
}
