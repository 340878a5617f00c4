//! Zip packaging of a project root.

use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::sandbox::ProjectRoot;

/// Deflate every regular file under `root` into an in-memory archive.
pub async fn zip_root(root: &ProjectRoot) -> anyhow::Result<Vec<u8>> {
    let dir = root.path().to_path_buf();
    tokio::task::spawn_blocking(move || zip_dir(&dir))
        .await
        .context("zip task panicked")?
}

/// Entry names are `/`-separated paths relative to `dir`.
pub fn zip_dir(dir: &Path) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.context("failed to walk project directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let data = std::fs::read(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        zip.start_file(name, options)?;
        zip.write_all(&data)?;
        entries += 1;
    }

    let cursor = zip.finish()?;
    tracing::debug!("Packed {} files from {}", entries, dir.display());
    Ok(cursor.into_inner())
}
