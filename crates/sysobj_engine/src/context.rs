/* 📖 # Why an explicit FsContext instead of process-wide state?

Handles need three things beyond their own path: the platform layer, the designated root
and a log of what they created. Keeping them in one cheaply clonable value means two
contexts (for example two tests running in parallel) never share a root, and the root
can only be set once per context: either by `designate_root` or implicitly by the first
directory handle constructed.
*/

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use sysobj_base::{FileIdentity, PalHandle, SysobjError, SysobjResult};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::directory::DirectoryHandle;
use crate::entry::Entry;
use crate::file::FileHandle;
use crate::lifecycle::{CreationMode, HandleOptions};
use crate::path::{Parent, resolve};

/// Diagnostic record of every path created through a handle.
#[derive(Debug, Default)]
pub struct CreationLog {
    paths: Mutex<Vec<PathBuf>>,
}

impl CreationLog {
    pub(crate) fn record(&self, path: &Path) {
        debug!(path = %path.display(), "recorded creation");
        self.paths.lock().push(path.to_path_buf());
    }

    /// Number of entries created so far.
    pub fn count(&self) -> usize {
        self.paths.lock().len()
    }

    /// Created paths, oldest first.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

#[derive(Debug)]
struct RootRef {
    path: PathBuf,
    identity: FileIdentity,
}

#[derive(Debug)]
struct ContextInner {
    pal: PalHandle,
    config: EngineConfig,
    root: OnceLock<RootRef>,
    creations: CreationLog,
}

/// Shared state for a family of handles.
#[derive(Debug, Clone)]
pub struct FsContext {
    inner: Arc<ContextInner>,
}

impl FsContext {
    pub fn new(pal: PalHandle) -> Self {
        Self::with_config(pal, EngineConfig::default())
    }

    pub fn with_config(pal: PalHandle, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                pal,
                config,
                root: OnceLock::new(),
                creations: CreationLog::default(),
            }),
        }
    }

    pub fn pal(&self) -> &PalHandle {
        &self.inner.pal
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn creation_log(&self) -> &CreationLog {
        &self.inner.creations
    }

    /// Path of the designated root, once there is one.
    pub fn root_path(&self) -> Option<&Path> {
        self.inner.root.get().map(|root| root.path.as_path())
    }

    /// Make the existing directory at `path` the root of this context.
    ///
    /// Fails if a root has already been set, explicitly or by constructing a directory
    /// handle.
    pub fn designate_root(&self, path: impl AsRef<Path>) -> SysobjResult<DirectoryHandle> {
        let path = resolve(self.pal(), None, path.as_ref())?;
        if !self.pal().is_directory(&path)? {
            return Err(Box::new(SysobjError::not_found(path)));
        }
        let identity = self.pal().file_identity(&path)?;
        let designated = self.inner.root.set(RootRef {
            path: path.clone(),
            identity,
        });
        if designated.is_err() {
            return Err(Box::new(SysobjError::invalid_argument(format!(
                "root is already designated at {}",
                self.root_path().unwrap_or(Path::new("?")).display()
            ))));
        }
        info!(root = %path.display(), "designated root");
        DirectoryHandle::open(self, path, &CreationMode::Find.into(), None)
    }

    /// Record `path` as root if none is set yet, then report whether `identity` is the root.
    pub(crate) fn claim_root(&self, path: &Path, identity: &FileIdentity) -> bool {
        let root = self.inner.root.get_or_init(|| {
            debug!(root = %path.display(), "first directory handle becomes the root");
            RootRef {
                path: path.to_path_buf(),
                identity: identity.clone(),
            }
        });
        root.identity == *identity
    }

    pub fn open_directory(
        &self,
        path: impl AsRef<Path>,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<DirectoryHandle> {
        let path = resolve(self.pal(), None, path.as_ref())?;
        DirectoryHandle::open(self, path, &options.into(), None)
    }

    pub fn open_file(
        &self,
        path: impl AsRef<Path>,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<FileHandle> {
        let path = resolve(self.pal(), None, path.as_ref())?;
        FileHandle::open(self, path, &options.into(), None)
    }

    /// Open `name` inside the existing directory `parent`.
    pub fn open_directory_in(
        &self,
        parent: impl AsRef<Path>,
        name: &str,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<DirectoryHandle> {
        let path = resolve(
            self.pal(),
            Some(Parent::Path(parent.as_ref())),
            Path::new(name),
        )?;
        DirectoryHandle::open(self, path, &options.into(), None)
    }

    /// Open file `name` inside the existing directory `parent`.
    pub fn open_file_in(
        &self,
        parent: impl AsRef<Path>,
        name: &str,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<FileHandle> {
        let path = resolve(
            self.pal(),
            Some(Parent::Path(parent.as_ref())),
            Path::new(name),
        )?;
        FileHandle::open(self, path, &options.into(), None)
    }

    /// Open an existing entry as whichever kind it is.
    pub fn classify(&self, path: impl AsRef<Path>) -> SysobjResult<Entry> {
        let path = resolve(self.pal(), None, path.as_ref())?;
        if !self.pal().path_exists(&path)? {
            return Err(Box::new(SysobjError::not_found(path)));
        }
        let options = HandleOptions::new(CreationMode::Find);
        if self.pal().is_directory(&path)? {
            Ok(Entry::Directory(DirectoryHandle::open(
                self, path, &options, None,
            )?))
        } else {
            Ok(Entry::File(FileHandle::open(self, path, &options, None)?))
        }
    }
}
