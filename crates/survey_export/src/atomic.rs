use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{io_error, ExportResult};

/// `<name>.tmp` beside the final file.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` through a `.tmp` sibling: fill it, fsync it, rename it over
/// the target. Readers never see a half-written export.
pub(crate) fn write_atomic<F>(path: &Path, fill: F) -> ExportResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> ExportResult<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error("creating", parent))?;
    }
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(io_error("creating", &tmp))?;
    let mut writer = BufWriter::new(file);
    fill(&mut writer)?;
    writer.flush().map_err(io_error("writing", &tmp))?;
    let file = writer
        .into_inner()
        .map_err(|err| io_error("writing", &tmp)(err.into_error()))?;
    file.sync_all().map_err(io_error("syncing", &tmp))?;
    std::fs::rename(&tmp, path).map_err(io_error("renaming", &tmp))?;
    Ok(())
}
