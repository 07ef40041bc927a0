/* 📖 # What does every handle share?

ObjectCore holds the state common to files and directories: resolved path, name, the
existence sample taken at construction, root status, the protection flag and a weak
back-reference to the parent directory. The parent is recomputed from the path on first
access and cached weakly, so a child never keeps its parent (and the parent's watcher)
alive on its own.

Nothing here caches existence. Operations re-stat the backing path and report
`StaleHandle` when it is gone, or when the path now names a different object than the one
the handle was constructed on (the entry was replaced under the same name).
*/

use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sysobj_base::{FileIdentity, SysobjError, SysobjResult};
use tracing::debug;

use crate::context::FsContext;
use crate::directory::{DirectoryHandle, DirectoryInner};
use crate::lifecycle::{self, CreationMode, EntryKind, HandleOptions};
use crate::visibility;

#[derive(Debug)]
pub struct ObjectCore {
    ctx: FsContext,
    path: PathBuf,
    name: String,
    kind: EntryKind,
    identity: FileIdentity,
    existed_before_construction: bool,
    is_root: bool,
    protected: AtomicBool,
    parent: Mutex<Weak<DirectoryInner>>,
}

impl ObjectCore {
    /// Reconcile `options` against the disk and capture the resulting state.
    pub(crate) fn construct(
        ctx: &FsContext,
        path: PathBuf,
        kind: EntryKind,
        options: &HandleOptions,
    ) -> SysobjResult<Self> {
        let reconciled = lifecycle::reconcile(ctx, &path, kind, options)?;
        let identity = ctx.pal().file_identity(&path)?;
        let is_root = match kind {
            EntryKind::Directory => ctx.claim_root(&path, &identity),
            EntryKind::File => false,
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            ctx: ctx.clone(),
            path,
            name,
            kind,
            identity,
            existed_before_construction: reconciled.existed_before,
            is_root,
            protected: AtomicBool::new(options.protected),
            parent: Mutex::new(Weak::new()),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ctx(&self) -> &FsContext {
        &self.ctx
    }

    pub(crate) fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    pub(crate) fn set_parent(&self, parent: &DirectoryHandle) {
        *self.parent.lock() = parent.downgrade();
    }

    pub(crate) fn options_for_reopen(&self) -> HandleOptions {
        HandleOptions::new(CreationMode::Find).protected(self.protected.load(Ordering::SeqCst))
    }

    /// Fail with `StaleHandle` if the backing path is gone or names a replaced object.
    pub(crate) fn ensure_live(&self) -> SysobjResult<()> {
        let pal = self.ctx.pal();
        let current = match pal.file_identity(&self.path) {
            Ok(current) => current,
            Err(_) if !pal.path_exists(&self.path)? => {
                return Err(Box::new(SysobjError::stale_handle(&self.path)));
            }
            Err(e) => return Err(e),
        };
        if current != self.identity {
            debug!(path = %self.path.display(), "backing object was replaced");
            return Err(Box::new(SysobjError::stale_handle(&self.path)));
        }
        Ok(())
    }

    fn parent(&self) -> SysobjResult<DirectoryHandle> {
        if self.is_root {
            return Err(Box::new(SysobjError::permission_denied(
                &self.path,
                "the root has no accessible parent",
            )));
        }
        if let Some(inner) = self.parent.lock().upgrade() {
            return Ok(DirectoryHandle::from_inner(inner));
        }
        let parent_path = self.path.parent().ok_or_else(|| {
            Box::new(SysobjError::permission_denied(
                &self.path,
                "the filesystem root has no parent",
            ))
        })?;
        let parent = DirectoryHandle::open(
            &self.ctx,
            parent_path.to_path_buf(),
            &CreationMode::Find.into(),
            None,
        )?;
        *self.parent.lock() = parent.downgrade();
        Ok(parent)
    }

    pub(crate) fn remove(&self) -> SysobjResult<()> {
        if self.protected.load(Ordering::SeqCst) {
            return Err(Box::new(SysobjError::permission_denied(
                &self.path,
                "handle is protected",
            )));
        }
        self.ensure_live()?;
        debug!(path = %self.path.display(), kind = ?self.kind, "removing entry");
        lifecycle::remove_entry(self.ctx.pal(), &self.path, self.kind)
    }
}

/// Operations every filesystem handle supports.
pub trait FsObject {
    #[doc(hidden)]
    fn object(&self) -> &ObjectCore;

    /// Absolute, normalized path.
    fn path(&self) -> &Path {
        &self.object().path
    }

    /// Final path segment.
    fn name(&self) -> &str {
        &self.object().name
    }

    fn is_directory(&self) -> bool {
        self.object().kind == EntryKind::Directory
    }

    fn is_root(&self) -> bool {
        self.object().is_root
    }

    /// Whether the path existed when this handle was constructed.
    fn existed_before_construction(&self) -> bool {
        self.object().existed_before_construction
    }

    fn is_protected(&self) -> bool {
        self.object().protected.load(Ordering::SeqCst)
    }

    fn set_protected(&self, protected: bool) {
        self.object().protected.store(protected, Ordering::SeqCst);
    }

    /// Re-stat the backing path.
    fn exists(&self) -> SysobjResult<bool> {
        let object = self.object();
        object.ctx.pal().path_exists(&object.path)
    }

    /// The enclosing directory. Fails with `PermissionDenied` on the root.
    fn parent(&self) -> SysobjResult<DirectoryHandle> {
        self.object().parent()
    }

    fn is_hidden(&self) -> SysobjResult<bool> {
        let object = self.object();
        object.ensure_live()?;
        visibility::is_hidden(object.ctx.pal(), &object.path, &object.name)
    }

    /// Delete the backing file, or the backing directory tree.
    fn remove(&self) -> SysobjResult<()> {
        self.object().remove()
    }
}
