use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{SysobjError, SysobjResult};

/* 📖 # What is the Platform Abstraction Layer (PAL)?

The PAL is the only place that touches the native filesystem or the change notification
machinery. Handles express all of their logic as calls to these primitives and react only
to their success or failure, which means:
- MockPal can drive the lifecycle and index logic deterministically in unit tests
- RealPal keeps `std::fs`, `walkdir` and `notify` usage in one file
- Platform differences (hidden attribute bit vs dot convention) are answered by the PAL
*/

/// Trait combining Read + Seek for file operations.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// How a write treats existing file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the contents.
    #[default]
    Truncate,
    /// Add to the end of the contents.
    Append,
}

/// One immediate entry of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Identity of the underlying filesystem object, independent of the path used to reach it.
///
/// Two paths that reach the same object (symlinks, case-insensitive lookups, `..` detours)
/// produce equal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    /// Device and inode number.
    Inode { device: u64, inode: u64 },
    /// Fully resolved path, for platforms without inode numbers.
    Canonical(PathBuf),
}

/// Kind of change reported by a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Removed,
}

/// File change event delivered to watch callbacks.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub kind: FileChangeKind,
    /// Paths the change applies to.
    pub changed_files: Vec<PathBuf>,
}

/// Callback invoked when watched files change.
pub type FileChangeCallback = Box<dyn Fn(FileChangeEvent) + Send + Sync>;

/// Live registration returned by [`Pal::watch_directory`].
///
/// Events are delivered for as long as the subscription is alive; dropping it (or calling
/// [`WatchSubscription::cancel`]) unsubscribes.
pub struct WatchSubscription {
    directory: PathBuf,
    _guard: Box<dyn Send>,
}

impl WatchSubscription {
    /// Wraps whatever keeps the underlying watch alive.
    pub fn new(directory: PathBuf, guard: impl Send + 'static) -> Self {
        Self {
            directory,
            _guard: Box::new(guard),
        }
    }

    /// The directory this subscription watches.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Unsubscribe now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Platform Abstraction Layer (PAL) trait providing filesystem and watch operations.
///
/// Two implementations are provided:
/// - `RealPal`: the native filesystem via `std::fs`, `walkdir` and `notify`
/// - `MockPal`: in-memory implementation for testing
///
/// Relative paths are resolved against the implementation's base directory.
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Check if anything exists at the given path.
    fn path_exists(&self, path: &Path) -> SysobjResult<bool>;

    /// Check if the given path is a directory.
    fn is_directory(&self, path: &Path) -> SysobjResult<bool>;

    /// Identity of the object at the given path.
    fn file_identity(&self, path: &Path) -> SysobjResult<FileIdentity>;

    /// Whether two paths reach the same object.
    fn same_file(&self, a: &Path, b: &Path) -> SysobjResult<bool> {
        Ok(self.file_identity(a)? == self.file_identity(b)?)
    }

    /// Lexically normalize a path to an absolute path, without touching the filesystem.
    fn absolute_path(&self, path: &Path) -> SysobjResult<PathBuf>;

    /// Create a single directory. The parent must exist.
    fn create_directory(&self, path: &Path) -> SysobjResult<()>;

    /// Create an empty file, truncating it if it exists.
    fn create_file(&self, path: &Path) -> SysobjResult<()>;

    /// Open a file for reading.
    fn read_file(&self, path: &Path) -> SysobjResult<Box<dyn ReadSeek + 'static>>;

    /// Read entire file contents as bytes.
    fn read_file_to_bytes(&self, path: &Path) -> SysobjResult<Vec<u8>> {
        let mut reader = self.read_file(path)?;
        let mut contents = Vec::new();
        reader
            .read_to_end(&mut contents)
            .map_err(|e| Box::new(SysobjError::file_error(path, e)))?;
        Ok(contents)
    }

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &Path) -> SysobjResult<String> {
        let contents = self.read_file_to_bytes(path)?;
        String::from_utf8(contents)
            .map_err(|_e| crate::err!("File is not valid UTF-8: {}", path.display()))
    }

    /// Open a file for writing. The file is created if missing.
    fn open_file_for_write(
        &self,
        path: &Path,
        mode: WriteMode,
    ) -> SysobjResult<Box<dyn Write + Send>>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> SysobjResult<()>;

    /// Remove a directory and all its contents.
    fn remove_directory_all(&self, path: &Path) -> SysobjResult<()>;

    /// List the immediate entries of a directory.
    fn list_directory(&self, path: &Path) -> SysobjResult<Vec<DirectoryEntry>>;

    /// Rename `from` to `to`.
    fn rename(&self, from: &Path, to: &Path) -> SysobjResult<()>;

    /// Whether this platform marks entries hidden with an attribute bit instead of a
    /// leading dot.
    fn supports_hidden_attribute(&self) -> bool;

    /// Read the hidden attribute bit.
    fn hidden_attribute(&self, path: &Path) -> SysobjResult<bool>;

    /// Set or clear the hidden attribute bit.
    fn set_hidden_attribute(&self, path: &Path, hidden: bool) -> SysobjResult<()>;

    /// Watch a directory for created and removed entries.
    ///
    /// Returns immediately; the callback is invoked asynchronously when changes occur,
    /// for as long as the returned subscription is alive. Implementations may report
    /// events for paths deeper than the immediate children; callers must filter.
    fn watch_directory(
        &self,
        directory: &Path,
        callback: FileChangeCallback,
    ) -> SysobjResult<WatchSubscription>;
}

/* 📖 # Why use Arc<dyn Pal> with PalHandle?

Every handle keeps a reference to the PAL it was created with, and watcher callbacks need
one on their own threads. Arc makes that a cheap clone without lifetime parameters.
*/

/// Handle to a PAL implementation, enabling shared ownership.
///
/// # Examples
///
/// ```no_run
/// use sysobj_base::{RealPal, PalHandle};
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_change_event_creation() {
        let event = FileChangeEvent {
            kind: FileChangeKind::Created,
            changed_files: vec![PathBuf::from("/a/one.txt"), PathBuf::from("/a/two.txt")],
        };
        assert_eq!(event.changed_files.len(), 2);
        assert_eq!(event.kind, FileChangeKind::Created);
    }

    #[test]
    fn test_pal_handle_clone() {
        use crate::pal::mock::MockPal;
        let pal = PalHandle::new(MockPal::new());
        let _pal_clone = pal.clone();
    }

    #[test]
    fn test_watch_subscription_runs_guard_drop_on_cancel() {
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Guard(Arc<AtomicBool>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let subscription = WatchSubscription::new(PathBuf::from("/w"), Guard(dropped.clone()));
        assert_eq!(subscription.directory(), Path::new("/w"));
        assert!(!dropped.load(Ordering::SeqCst));
        subscription.cancel();
        assert!(dropped.load(Ordering::SeqCst));
    }
}
