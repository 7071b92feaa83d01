use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("packing workspace archive: {0}")]
    Io(#[from] io::Error),
}

/// Entries filtered out of every workspace archive: hidden files and the
/// filesystem recovery directory. Applies recursively, so an excluded
/// directory's subtree is never visited.
fn is_excluded(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with("lost+found")
}

/// Pack `source_dir` into a gzip-compressed tar archive at `dest`, rooted
/// under the single top-level name `archive_root`.
pub fn pack_workspace(source_dir: &Path, archive_root: &str, dest: &Path) -> Result<(), PackError> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_dir(&mut builder, source_dir, Path::new(archive_root))?;

    builder.into_inner()?.finish()?;
    Ok(())
}

fn append_dir<W: io::Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    prefix: &Path,
) -> io::Result<()> {
    builder.append_dir(prefix, dir)?;

    let mut entries = std::fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if is_excluded(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            append_dir(builder, &path, &name)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}
