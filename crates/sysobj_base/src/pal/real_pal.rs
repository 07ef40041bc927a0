use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use path_absolutize::Absolutize;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::{SysobjError, SysobjResult};

use super::traits::{
    DirectoryEntry, FileChangeCallback, FileChangeEvent, FileChangeKind, FileIdentity, Pal,
    ReadSeek, WatchSubscription, WriteMode,
};

/* 📖 # Why use std::fs instead of async or other crates?

Handle operations are short, synchronous calls made from caller threads, and the only
background work is watcher delivery, which `notify` already runs on its own thread.
std::fs is sufficient, well-tested and keeps the call graph easy to follow.
*/

/// Concrete PAL implementation using the real filesystem.
///
/// Relative paths are resolved against a configured base directory; absolute paths are
/// used as given.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
}

fn file_error(path: &Path, source: std::io::Error) -> Box<SysobjError> {
    Box::new(SysobjError::file_error(path, source))
}

impl RealPal {
    /// Create a new RealPal with the given base directory.
    ///
    /// # Arguments
    /// * `base_dir` - Relative paths will be resolved against this directory
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Resolve a path against the base directory.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn path_exists(&self, path: &Path) -> SysobjResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved
            .try_exists()
            .map_err(|e| file_error(&resolved, e))?;
        debug!(exists, resolved = %resolved.display(), "checked path existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn is_directory(&self, path: &Path) -> SysobjResult<bool> {
        let resolved = self.resolve_path(path);
        let is_directory = resolved.is_dir();
        debug!(is_directory, "checked path kind");
        Ok(is_directory)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn file_identity(&self, path: &Path) -> SysobjResult<FileIdentity> {
        let resolved = self.resolve_path(path);
        let identity = native_identity(&resolved).map_err(|e| {
            debug!(error = %e, "failed to read file identity");
            file_error(&resolved, e)
        })?;
        Ok(identity)
    }

    fn absolute_path(&self, path: &Path) -> SysobjResult<PathBuf> {
        let absolute = path
            .absolutize_from(&self.base_dir)
            .map_err(|e| file_error(path, e))?;
        Ok(absolute.into_owned())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn create_directory(&self, path: &Path) -> SysobjResult<()> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "creating directory");
        fs::create_dir(&resolved).map_err(|e| {
            debug!(error = %e, "failed to create directory");
            file_error(&resolved, e)
        })?;
        debug!("directory created successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn create_file(&self, path: &Path) -> SysobjResult<()> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "creating file");
        fs::File::create(&resolved).map_err(|e| {
            debug!(error = %e, "failed to create file");
            file_error(&resolved, e)
        })?;
        debug!("file created successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn read_file(&self, path: &Path) -> SysobjResult<Box<dyn ReadSeek + 'static>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for reading");
        let file = fs::File::open(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open file");
            file_error(&resolved, e)
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn open_file_for_write(
        &self,
        path: &Path,
        mode: WriteMode,
    ) -> SysobjResult<Box<dyn Write + Send>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for writing");
        let mut options = fs::OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = options.open(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open file for writing");
            file_error(&resolved, e)
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn remove_file(&self, path: &Path) -> SysobjResult<()> {
        let resolved = self.resolve_path(path);
        fs::remove_file(&resolved).map_err(|e| {
            debug!(error = %e, "failed to remove file");
            file_error(&resolved, e)
        })?;
        debug!("file removed successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn remove_directory_all(&self, path: &Path) -> SysobjResult<()> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "removing directory and contents");
        fs::remove_dir_all(&resolved).map_err(|e| {
            debug!(error = %e, "failed to remove directory");
            file_error(&resolved, e)
        })?;
        debug!("directory removed successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn list_directory(&self, path: &Path) -> SysobjResult<Vec<DirectoryEntry>> {
        let resolved = self.resolve_path(path);
        if !resolved.is_dir() {
            debug!("directory not found");
            return Err(file_error(
                &resolved,
                std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
            ));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&resolved)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                debug!(error = %e, "error listing directory");
                file_error(
                    e.path().unwrap_or(resolved.as_path()),
                    std::io::Error::other(e.to_string()),
                )
            })?;
            // Symlinks are classified by their target, like a plain `is_dir` check.
            let is_directory = if entry.file_type().is_symlink() {
                entry.path().is_dir()
            } else {
                entry.file_type().is_dir()
            };
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory,
            });
        }
        debug!(count = entries.len(), "listed directory");
        Ok(entries)
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    fn rename(&self, from: &Path, to: &Path) -> SysobjResult<()> {
        let resolved_from = self.resolve_path(from);
        let resolved_to = self.resolve_path(to);
        fs::rename(&resolved_from, &resolved_to).map_err(|e| {
            debug!(error = %e, "failed to rename");
            file_error(&resolved_from, e)
        })?;
        debug!("renamed successfully");
        Ok(())
    }

    fn supports_hidden_attribute(&self) -> bool {
        cfg!(windows)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn hidden_attribute(&self, path: &Path) -> SysobjResult<bool> {
        let resolved = self.resolve_path(path);
        hidden_bit::get(&resolved)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn set_hidden_attribute(&self, path: &Path, hidden: bool) -> SysobjResult<()> {
        let resolved = self.resolve_path(path);
        hidden_bit::set(&resolved, hidden)?;
        debug!(hidden, "updated hidden attribute");
        Ok(())
    }

    #[instrument(skip(self, callback), fields(directory = %directory.display()))]
    fn watch_directory(
        &self,
        directory: &Path,
        callback: FileChangeCallback,
    ) -> SysobjResult<WatchSubscription> {
        let resolved = self.resolve_path(directory);
        debug!(resolved = %resolved.display(), "setting up directory watch");

        if !resolved.is_dir() {
            debug!("directory not found");
            return Err(file_error(
                &resolved,
                std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
            ));
        }

        let watched = resolved.clone();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for change in translate_event(event) {
                        callback(change);
                    }
                }
                Err(e) => {
                    warn!(directory = %watched.display(), error = %e, "watcher reported an error");
                }
            })
            .map_err(|e| file_error(&resolved, std::io::Error::other(e.to_string())))?;

        watcher
            .watch(&resolved, RecursiveMode::NonRecursive)
            .map_err(|e| file_error(&resolved, std::io::Error::other(e.to_string())))?;

        debug!("directory watch established");
        Ok(WatchSubscription::new(resolved, watcher))
    }
}

/// Map a notify event onto created/removed changes. Renames are reported as a removal of
/// the old name and a creation of the new one; other event kinds are dropped.
pub(crate) fn translate_event(event: Event) -> Vec<FileChangeEvent> {
    let single = |kind, paths: Vec<PathBuf>| {
        vec![FileChangeEvent {
            kind,
            changed_files: paths,
        }]
    };
    match event.kind {
        EventKind::Create(_) => single(FileChangeKind::Created, event.paths),
        EventKind::Remove(_) => single(FileChangeKind::Removed, event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            single(FileChangeKind::Removed, event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            single(FileChangeKind::Created, event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut changes = Vec::new();
            if let Some(from) = paths.next() {
                changes.push(FileChangeEvent {
                    kind: FileChangeKind::Removed,
                    changed_files: vec![from],
                });
            }
            if let Some(to) = paths.next() {
                changes.push(FileChangeEvent {
                    kind: FileChangeKind::Created,
                    changed_files: vec![to],
                });
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|path| FileChangeEvent {
                kind: if path.exists() {
                    FileChangeKind::Created
                } else {
                    FileChangeKind::Removed
                },
                changed_files: vec![path],
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(unix)]
fn native_identity(path: &Path) -> std::io::Result<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    let metadata = fs::metadata(path)?;
    Ok(FileIdentity::Inode {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn native_identity(path: &Path) -> std::io::Result<FileIdentity> {
    Ok(FileIdentity::Canonical(fs::canonicalize(path)?))
}

#[cfg(windows)]
mod hidden_bit {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use winapi::um::fileapi::{GetFileAttributesW, INVALID_FILE_ATTRIBUTES, SetFileAttributesW};
    use winapi::um::winnt::FILE_ATTRIBUTE_HIDDEN;

    use crate::{SysobjError, SysobjResult};

    fn wide(path: &Path) -> Vec<u16> {
        OsStr::new(path).encode_wide().chain(Some(0)).collect()
    }

    fn attributes(path: &Path, wide_path: &[u16]) -> SysobjResult<u32> {
        // SAFETY: `wide_path` is a NUL-terminated UTF-16 buffer that outlives the call.
        let attrs = unsafe { GetFileAttributesW(wide_path.as_ptr()) };
        if attrs == INVALID_FILE_ATTRIBUTES {
            return Err(Box::new(SysobjError::file_error(
                path,
                std::io::Error::last_os_error(),
            )));
        }
        Ok(attrs)
    }

    pub(super) fn get(path: &Path) -> SysobjResult<bool> {
        let wide_path = wide(path);
        Ok(attributes(path, &wide_path)? & FILE_ATTRIBUTE_HIDDEN != 0)
    }

    pub(super) fn set(path: &Path, hidden: bool) -> SysobjResult<()> {
        let wide_path = wide(path);
        let attrs = attributes(path, &wide_path)?;
        let updated = if hidden {
            attrs | FILE_ATTRIBUTE_HIDDEN
        } else {
            attrs & !FILE_ATTRIBUTE_HIDDEN
        };
        // SAFETY: same buffer as above, still NUL-terminated and alive.
        if unsafe { SetFileAttributesW(wide_path.as_ptr(), updated) } == 0 {
            return Err(Box::new(SysobjError::file_error(
                path,
                std::io::Error::last_os_error(),
            )));
        }
        Ok(())
    }
}

#[cfg(not(windows))]
mod hidden_bit {
    use std::path::Path;

    use crate::SysobjResult;

    pub(super) fn get(path: &Path) -> SysobjResult<bool> {
        crate::bail!(
            "Hidden attribute is not supported on this platform: {}",
            path.display()
        )
    }

    pub(super) fn set(path: &Path, _hidden: bool) -> SysobjResult<()> {
        crate::bail!(
            "Hidden attribute is not supported on this platform: {}",
            path.display()
        )
    }
}
