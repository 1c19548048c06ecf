//! File-system helpers built on `cap-std`, `camino` and `tempfile`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::debug;
use tempfile::NamedTempFile;

use crate::IoError;

/// Open `path` for buffered reading.
///
/// # Errors
/// Returns [`IoError::Io`] when the file cannot be opened.
pub fn open_reader(path: &Utf8Path) -> Result<BufReader<File>, IoError> {
    fs_utf8::File::open_ambient(path, ambient_authority())
        .map(|file| BufReader::new(file.into_std()))
        .map_err(|source| IoError::io(path, source))
}

/// Whether `path` names an existing regular file.
///
/// # Errors
/// Returns [`IoError::Io`] when the parent directory cannot be inspected.
pub fn is_file(path: &Utf8Path) -> Result<bool, IoError> {
    let parent = parent_of(path);
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    let dir = match fs_utf8::Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => return Err(IoError::io(parent, source)),
    };
    match dir.metadata(name) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(IoError::io(path, source)),
    }
}

/// Create the parent directory of `path` and any missing ancestors.
///
/// # Errors
/// Returns [`IoError::Io`] when a directory cannot be created.
pub fn ensure_parent_dir(path: &Utf8Path) -> Result<(), IoError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let (anchor, rest) = anchor_and_rest(parent);
    if rest.as_str().is_empty() {
        return Ok(());
    }
    fs_utf8::Dir::open_ambient_dir(&anchor, ambient_authority())
        .and_then(|base| base.create_dir_all(&rest))
        .map_err(|source| IoError::io(parent, source))
}

/// Write `path` atomically.
///
/// `write` fills a temporary file in the destination directory. Only after
/// it succeeds is the file flushed, synced and renamed into place; on any
/// failure the temporary file is removed and `path` is left untouched.
///
/// # Errors
/// Returns the error raised by `write`, or [`IoError::Io`] when the
/// temporary file cannot be created, synced or renamed.
pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), IoError>,
{
    ensure_parent_dir(path)?;
    let parent = parent_of(path);
    let mut staged = NamedTempFile::new_in(parent).map_err(|source| IoError::io(parent, source))?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|source| IoError::io(path, source))?;
    }
    staged
        .as_file()
        .sync_all()
        .map_err(|source| IoError::io(path, source))?;
    staged
        .persist(path)
        .map_err(|err| IoError::io(path, err.error))?;
    debug!("published {path}");
    Ok(())
}

fn parent_of(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// Split `dir` into the directory it is resolved from and the part below it.
///
/// Leading prefix, root, `.` and `..` components form the anchor. A bare
/// relative path is anchored at `.`.
fn anchor_and_rest(dir: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    let mut components = dir.components().peekable();
    let mut anchor = Utf8PathBuf::new();
    while let Some(component) =
        components.next_if(|component| !matches!(component, Utf8Component::Normal(_)))
    {
        anchor.push(component.as_str());
    }
    if anchor.as_str().is_empty() {
        anchor.push(".");
    }
    let rest = components.map(|component| component.as_str()).collect();
    (anchor, rest)
}
