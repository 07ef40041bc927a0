use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use path_absolutize::Absolutize;

use crate::{SysobjError, SysobjResult};

use super::traits::{
    DirectoryEntry, FileChangeCallback, FileChangeEvent, FileChangeKind, FileIdentity, Pal,
    ReadSeek, WatchSubscription, WriteMode,
};

/* 📖 # Why an in-memory tree with synchronous event delivery?

MockPal keeps every node in a HashMap keyed by normalized absolute path. Each node gets a
fresh inode number when it is inserted and keeps it across renames, so identity behaves like
a real filesystem: a path that is removed and recreated names a different object.

1. **Speed**: No filesystem I/O, deterministic and fast for unit tests
2. **Isolation**: No side effects on the real filesystem
3. **Control**: Tests add nodes silently (`add_file`) and decide when a notification
   arrives (`emit_change`), which is how external mutations are simulated
4. **Thread-safe**: a Mutex guards the tree so concurrency tests can hammer it

Mutations made through the Pal trait notify every subscription whose directory is an
ancestor of the changed path, the way a recursive watcher would. Handles therefore have to
filter for their direct children, which is exactly the behavior under test. Callbacks run
on the mutating thread after the tree lock is released.
*/

#[derive(Debug, Clone)]
enum MockNode {
    Directory {
        inode: u64,
        hidden: bool,
    },
    File {
        inode: u64,
        content: Vec<u8>,
        hidden: bool,
    },
}

impl MockNode {
    fn is_directory(&self) -> bool {
        matches!(self, MockNode::Directory { .. })
    }

    fn inode(&self) -> u64 {
        match self {
            MockNode::Directory { inode, .. } | MockNode::File { inode, .. } => *inode,
        }
    }

    fn hidden_mut(&mut self) -> &mut bool {
        match self {
            MockNode::Directory { hidden, .. } | MockNode::File { hidden, .. } => hidden,
        }
    }
}

struct MockWatch {
    directory: PathBuf,
    callback: Arc<FileChangeCallback>,
}

#[derive(Default)]
struct MockState {
    nodes: HashMap<PathBuf, MockNode>,
    watches: HashMap<u64, MockWatch>,
    next_watch_id: u64,
    next_inode: u64,
}

impl MockState {
    fn allocate_inode(&mut self) -> u64 {
        self.next_inode += 1;
        self.next_inode
    }

    fn new_directory(&mut self) -> MockNode {
        MockNode::Directory {
            inode: self.allocate_inode(),
            hidden: false,
        }
    }

    fn new_file(&mut self, content: Vec<u8>) -> MockNode {
        MockNode::File {
            inode: self.allocate_inode(),
            content,
            hidden: false,
        }
    }

    fn insert_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if !self.nodes.contains_key(ancestor) {
                let directory = self.new_directory();
                self.nodes.insert(ancestor.to_path_buf(), directory);
            }
        }
    }
}

/// In-memory PAL implementation for testing.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sysobj_base::{MockPal, Pal};
///
/// let mock = MockPal::new();
/// mock.add_file("/work/test.txt", b"content".to_vec());
/// let content = mock.read_file_to_string(Path::new("/work/test.txt")).unwrap();
/// assert_eq!(content, "content");
/// ```
#[derive(Clone)]
pub struct MockPal {
    state: Arc<Mutex<MockState>>,
    cwd: PathBuf,
    hidden_attribute: bool,
}

fn io_error(path: &Path, kind: std::io::ErrorKind, message: &str) -> Box<SysobjError> {
    Box::new(SysobjError::file_error(
        path,
        std::io::Error::new(kind, format!("{}: {}", message, path.display())),
    ))
}

impl MockPal {
    /// Create a MockPal holding only the root directory `/`, using the dot convention
    /// for hidden entries.
    pub fn new() -> Self {
        let mut state = MockState::default();
        let root = state.new_directory();
        state.nodes.insert(PathBuf::from("/"), root);
        Self {
            state: Arc::new(Mutex::new(state)),
            cwd: PathBuf::from("/"),
            hidden_attribute: false,
        }
    }

    /// Make this mock behave like a platform with a native hidden attribute bit.
    pub fn with_hidden_attribute(mut self) -> Self {
        self.hidden_attribute = true;
        self
    }

    /// Resolve relative paths against `cwd` instead of `/`.
    pub fn with_current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        match path.absolutize_from(&self.cwd) {
            Ok(absolute) => absolute.into_owned(),
            Err(_) => self.cwd.join(path),
        }
    }

    /// Add a file (and any missing ancestors) without notifying watchers.
    ///
    /// Replacing an existing node gives the path a new identity.
    pub fn add_file(&self, path: impl AsRef<Path>, content: Vec<u8>) {
        let path = self.normalize(path.as_ref());
        let mut state = self.state.lock();
        state.insert_ancestors(&path);
        let file = state.new_file(content);
        state.nodes.insert(path, file);
    }

    /// Add a directory (and any missing ancestors) without notifying watchers.
    ///
    /// An existing directory is left as it is.
    pub fn add_directory(&self, path: impl AsRef<Path>) {
        let path = self.normalize(path.as_ref());
        let mut state = self.state.lock();
        state.insert_ancestors(&path);
        if !state.nodes.get(&path).is_some_and(MockNode::is_directory) {
            let directory = state.new_directory();
            state.nodes.insert(path, directory);
        }
    }

    /// Deliver a change notification to matching subscriptions, as if the platform's
    /// watcher had observed it.
    pub fn emit_change(&self, kind: FileChangeKind, path: impl AsRef<Path>) {
        let path = self.normalize(path.as_ref());
        self.deliver(kind, &[path]);
    }

    /// Number of subscriptions that are currently alive.
    pub fn active_watch_count(&self) -> usize {
        self.state.lock().watches.len()
    }

    /// Current contents of a file, if it exists.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = self.normalize(path.as_ref());
        match self.state.lock().nodes.get(&path) {
            Some(MockNode::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn deliver(&self, kind: FileChangeKind, paths: &[PathBuf]) {
        for path in paths {
            let callbacks: Vec<Arc<FileChangeCallback>> = {
                let state = self.state.lock();
                state
                    .watches
                    .values()
                    .filter(|watch| path != &watch.directory && path.starts_with(&watch.directory))
                    .map(|watch| watch.callback.clone())
                    .collect()
            };
            for callback in callbacks {
                callback(FileChangeEvent {
                    kind,
                    changed_files: vec![path.clone()],
                });
            }
        }
    }

    fn require_parent_directory(state: &MockState, path: &Path) -> SysobjResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| io_error(path, std::io::ErrorKind::InvalidInput, "No parent"))?;
        match state.nodes.get(parent) {
            Some(node) if node.is_directory() => Ok(()),
            _ => Err(io_error(
                path,
                std::io::ErrorKind::NotFound,
                "Parent directory not found",
            )),
        }
    }

    /// Remove a node and all of its descendants, returning the removed paths deepest first.
    fn remove_subtree(state: &mut MockState, path: &Path) -> Vec<PathBuf> {
        let mut removed: Vec<PathBuf> = state
            .nodes
            .keys()
            .filter(|candidate| candidate.starts_with(path))
            .cloned()
            .collect();
        for candidate in &removed {
            state.nodes.remove(candidate);
        }
        removed.sort_by_key(|candidate| std::cmp::Reverse(candidate.components().count()));
        removed
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockPal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockPal")
            .field("nodes", &state.nodes.len())
            .field("watches", &state.watches.len())
            .field("hidden_attribute", &self.hidden_attribute)
            .finish()
    }
}

impl Pal for MockPal {
    fn path_exists(&self, path: &Path) -> SysobjResult<bool> {
        let path = self.normalize(path);
        Ok(self.state.lock().nodes.contains_key(&path))
    }

    fn is_directory(&self, path: &Path) -> SysobjResult<bool> {
        let path = self.normalize(path);
        Ok(self
            .state
            .lock()
            .nodes
            .get(&path)
            .is_some_and(MockNode::is_directory))
    }

    fn file_identity(&self, path: &Path) -> SysobjResult<FileIdentity> {
        let path = self.normalize(path);
        match self.state.lock().nodes.get(&path) {
            Some(node) => Ok(FileIdentity::Inode {
                device: 0,
                inode: node.inode(),
            }),
            None => Err(io_error(&path, std::io::ErrorKind::NotFound, "Not found")),
        }
    }

    fn absolute_path(&self, path: &Path) -> SysobjResult<PathBuf> {
        Ok(self.normalize(path))
    }

    fn create_directory(&self, path: &Path) -> SysobjResult<()> {
        let path = self.normalize(path);
        {
            let mut state = self.state.lock();
            Self::require_parent_directory(&state, &path)?;
            if state.nodes.contains_key(&path) {
                return Err(io_error(
                    &path,
                    std::io::ErrorKind::AlreadyExists,
                    "Already exists",
                ));
            }
            let directory = state.new_directory();
            state.nodes.insert(path.clone(), directory);
        }
        self.deliver(FileChangeKind::Created, &[path]);
        Ok(())
    }

    fn create_file(&self, path: &Path) -> SysobjResult<()> {
        let path = self.normalize(path);
        let created = {
            let mut state = self.state.lock();
            Self::require_parent_directory(&state, &path)?;
            match state.nodes.get_mut(&path) {
                Some(MockNode::File { content, .. }) => {
                    content.clear();
                    false
                }
                Some(MockNode::Directory { .. }) => {
                    return Err(io_error(
                        &path,
                        std::io::ErrorKind::IsADirectory,
                        "Is a directory",
                    ));
                }
                None => {
                    let file = state.new_file(Vec::new());
                    state.nodes.insert(path.clone(), file);
                    true
                }
            }
        };
        if created {
            self.deliver(FileChangeKind::Created, &[path]);
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> SysobjResult<Box<dyn ReadSeek + 'static>> {
        let path = self.normalize(path);
        match self.state.lock().nodes.get(&path) {
            Some(MockNode::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockNode::Directory { .. }) => Err(io_error(
                &path,
                std::io::ErrorKind::IsADirectory,
                "Is a directory",
            )),
            None => Err(io_error(
                &path,
                std::io::ErrorKind::NotFound,
                "File not found",
            )),
        }
    }

    fn open_file_for_write(
        &self,
        path: &Path,
        mode: WriteMode,
    ) -> SysobjResult<Box<dyn Write + Send>> {
        let path = self.normalize(path);
        let state = self.state.lock();
        Self::require_parent_directory(&state, &path)?;
        if state.nodes.get(&path).is_some_and(MockNode::is_directory) {
            return Err(io_error(
                &path,
                std::io::ErrorKind::IsADirectory,
                "Is a directory",
            ));
        }
        // Return a writer that will store in the mock storage when dropped
        Ok(Box::new(MockFileWriter {
            path,
            mode,
            state: Arc::clone(&self.state),
            buffer: Vec::new(),
        }))
    }

    fn remove_file(&self, path: &Path) -> SysobjResult<()> {
        let path = self.normalize(path);
        {
            let mut state = self.state.lock();
            match state.nodes.get(&path) {
                Some(MockNode::File { .. }) => {
                    state.nodes.remove(&path);
                }
                Some(MockNode::Directory { .. }) => {
                    return Err(io_error(
                        &path,
                        std::io::ErrorKind::IsADirectory,
                        "Is a directory",
                    ));
                }
                None => {
                    return Err(io_error(
                        &path,
                        std::io::ErrorKind::NotFound,
                        "File not found",
                    ));
                }
            }
        }
        self.deliver(FileChangeKind::Removed, &[path]);
        Ok(())
    }

    fn remove_directory_all(&self, path: &Path) -> SysobjResult<()> {
        let path = self.normalize(path);
        let removed = {
            let mut state = self.state.lock();
            if !state.nodes.get(&path).is_some_and(MockNode::is_directory) {
                return Err(io_error(
                    &path,
                    std::io::ErrorKind::NotFound,
                    "Directory not found",
                ));
            }
            Self::remove_subtree(&mut state, &path)
        };
        self.deliver(FileChangeKind::Removed, &removed);
        Ok(())
    }

    fn list_directory(&self, path: &Path) -> SysobjResult<Vec<DirectoryEntry>> {
        let path = self.normalize(path);
        let state = self.state.lock();
        if !state.nodes.get(&path).is_some_and(MockNode::is_directory) {
            return Err(io_error(
                &path,
                std::io::ErrorKind::NotFound,
                "Directory not found",
            ));
        }
        let mut entries: Vec<DirectoryEntry> = state
            .nodes
            .iter()
            .filter(|(candidate, _)| candidate.parent() == Some(path.as_path()))
            .filter_map(|(candidate, node)| {
                candidate.file_name().map(|name| DirectoryEntry {
                    name: name.to_string_lossy().into_owned(),
                    is_directory: node.is_directory(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> SysobjResult<()> {
        let from = self.normalize(from);
        let to = self.normalize(to);
        {
            let mut state = self.state.lock();
            if !state.nodes.contains_key(&from) {
                return Err(io_error(&from, std::io::ErrorKind::NotFound, "Not found"));
            }
            if state.nodes.contains_key(&to) {
                return Err(io_error(
                    &to,
                    std::io::ErrorKind::AlreadyExists,
                    "Already exists",
                ));
            }
            Self::require_parent_directory(&state, &to)?;
            let moved: Vec<(PathBuf, MockNode)> = state
                .nodes
                .iter()
                .filter(|(candidate, _)| candidate.starts_with(&from))
                .map(|(candidate, node)| (candidate.clone(), node.clone()))
                .collect();
            for (old_path, node) in moved {
                state.nodes.remove(&old_path);
                let suffix = old_path.strip_prefix(&from).unwrap_or(Path::new(""));
                let new_path = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                state.nodes.insert(new_path, node);
            }
        }
        self.deliver(FileChangeKind::Removed, &[from]);
        self.deliver(FileChangeKind::Created, &[to]);
        Ok(())
    }

    fn supports_hidden_attribute(&self) -> bool {
        self.hidden_attribute
    }

    fn hidden_attribute(&self, path: &Path) -> SysobjResult<bool> {
        let path = self.normalize(path);
        if !self.hidden_attribute {
            crate::bail!(
                "Hidden attribute is not supported on this platform: {}",
                path.display()
            );
        }
        let mut state = self.state.lock();
        match state.nodes.get_mut(&path) {
            Some(node) => Ok(*node.hidden_mut()),
            None => Err(io_error(&path, std::io::ErrorKind::NotFound, "Not found")),
        }
    }

    fn set_hidden_attribute(&self, path: &Path, hidden: bool) -> SysobjResult<()> {
        let path = self.normalize(path);
        if !self.hidden_attribute {
            crate::bail!(
                "Hidden attribute is not supported on this platform: {}",
                path.display()
            );
        }
        let mut state = self.state.lock();
        match state.nodes.get_mut(&path) {
            Some(node) => {
                *node.hidden_mut() = hidden;
                Ok(())
            }
            None => Err(io_error(&path, std::io::ErrorKind::NotFound, "Not found")),
        }
    }

    fn watch_directory(
        &self,
        directory: &Path,
        callback: FileChangeCallback,
    ) -> SysobjResult<WatchSubscription> {
        let directory = self.normalize(directory);
        let mut state = self.state.lock();
        if !state
            .nodes
            .get(&directory)
            .is_some_and(MockNode::is_directory)
        {
            return Err(io_error(
                &directory,
                std::io::ErrorKind::NotFound,
                "Directory not found",
            ));
        }
        let id = state.next_watch_id;
        state.next_watch_id += 1;
        state.watches.insert(
            id,
            MockWatch {
                directory: directory.clone(),
                callback: Arc::new(callback),
            },
        );
        Ok(WatchSubscription::new(
            directory,
            MockWatchGuard {
                id,
                state: Arc::downgrade(&self.state),
            },
        ))
    }
}

/// Removes its registration from the mock when the subscription is dropped.
struct MockWatchGuard {
    id: u64,
    state: Weak<Mutex<MockState>>,
}

impl Drop for MockWatchGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().watches.remove(&self.id);
        }
    }
}

/// Helper struct for writing files to MockPal.
struct MockFileWriter {
    path: PathBuf,
    mode: WriteMode,
    state: Arc<Mutex<MockState>>,
    buffer: Vec<u8>,
}

impl Write for MockFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for MockFileWriter {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let buffer = std::mem::take(&mut self.buffer);
        match state.nodes.get_mut(&self.path) {
            Some(MockNode::File { content, .. }) => match self.mode {
                WriteMode::Truncate => *content = buffer,
                WriteMode::Append => content.extend_from_slice(&buffer),
            },
            _ => {
                let file = state.new_file(buffer);
                state.nodes.insert(self.path.clone(), file);
            }
        }
    }
}
