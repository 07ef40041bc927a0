use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use sysobj_base::{FileChangeKind, SysobjError, SysobjResult};
use tracing::{debug, instrument};

use crate::context::FsContext;
use crate::entry::{Entry, Member, PropertyValue};
use crate::file::FileHandle;
use crate::index::{ChildIndex, ChildMap};
use crate::lifecycle::{CreationMode, EntryKind, HandleOptions};
use crate::object::{FsObject, ObjectCore};
use crate::path::{Parent, resolve, validate_child_name};
use crate::visibility::{self, VisibilityChange};
use crate::watcher::watch_direct_children;

/// Names answered by [`DirectoryHandle::member`] before the child index is consulted.
pub const PROPERTY_NAMES: &[&str] = &[
    "name",
    "path",
    "is_root",
    "protected",
    "existed_before_construction",
    "indexed",
];

#[derive(Debug)]
pub struct DirectoryInner {
    object: ObjectCore,
    index: ChildIndex,
}

/// Handle to a directory, with a lazily built and change-notified index of its children.
///
/// Clones share the index and its watch subscription. The subscription is released when
/// the directory is removed through a handle, or when the last clone is dropped.
#[derive(Clone)]
pub struct DirectoryHandle(Arc<DirectoryInner>);

impl DirectoryHandle {
    pub(crate) fn open(
        ctx: &FsContext,
        path: PathBuf,
        options: &HandleOptions,
        parent: Option<&DirectoryHandle>,
    ) -> SysobjResult<Self> {
        let object = ObjectCore::construct(ctx, path, EntryKind::Directory, options)?;
        if let Some(parent) = parent {
            object.set_parent(parent);
        }
        Ok(Self(Arc::new(DirectoryInner {
            object,
            index: ChildIndex::default(),
        })))
    }

    pub(crate) fn from_inner(inner: Arc<DirectoryInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<DirectoryInner> {
        Arc::downgrade(&self.0)
    }

    fn ctx(&self) -> &FsContext {
        self.0.object.ctx()
    }

    /// Whether both handles are clones of one another.
    pub fn same_handle(&self, other: &DirectoryHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the child index has been built.
    pub fn is_indexed(&self) -> bool {
        self.0.index.is_indexed()
    }

    /// The immediate children, by name.
    ///
    /// The first call lists the directory and subscribes to changes; later calls return
    /// the snapshot maintained by change notifications.
    pub fn children(&self) -> SysobjResult<Arc<ChildMap>> {
        self.0.object.ensure_live()?;
        if let Some(snapshot) = self.0.index.snapshot() {
            return Ok(snapshot);
        }
        let _rebuild = self.0.index.lock_rebuild();
        if let Some(snapshot) = self.0.index.snapshot() {
            return Ok(snapshot);
        }
        // Subscribe before listing so nothing created in between is missed.
        if !self.0.index.has_subscription() {
            self.subscribe()?;
        }
        let map = self.list_children(None)?;
        debug!(path = %self.path().display(), count = map.len(), "indexed directory");
        Ok(self.0.index.install(map))
    }

    /// The immediate children as a list, ordered by name.
    pub fn contents(&self) -> SysobjResult<Vec<Entry>> {
        Ok(self.children()?.values().cloned().collect())
    }

    /// Indexed child called `name`, if any.
    pub fn lookup(&self, name: &str) -> SysobjResult<Option<Entry>> {
        Ok(self.children()?.get(name).cloned())
    }

    /// Named property of this handle, falling back to the child called `name`.
    pub fn member(&self, name: &str) -> SysobjResult<Option<Member>> {
        if let Some(value) = self.property(name) {
            return Ok(Some(Member::Property(value)));
        }
        Ok(self.lookup(name)?.map(Member::Child))
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        let value = match name {
            "name" => PropertyValue::Text(self.name().to_string()),
            "path" => PropertyValue::Path(self.path().to_path_buf()),
            "is_root" => PropertyValue::Flag(self.is_root()),
            "protected" => PropertyValue::Flag(self.is_protected()),
            "existed_before_construction" => {
                PropertyValue::Flag(self.existed_before_construction())
            }
            "indexed" => PropertyValue::Flag(self.is_indexed()),
            _ => return None,
        };
        Some(value)
    }

    /// Path of the child called `name`, without touching the filesystem.
    pub fn join(&self, name: &str) -> SysobjResult<PathBuf> {
        resolve(self.ctx().pal(), Some(Parent::Handle(self)), Path::new(name))
    }

    pub fn make_subdirectory(
        &self,
        name: &str,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<DirectoryHandle> {
        self.0.object.ensure_live()?;
        let path = self.join(name)?;
        let directory = DirectoryHandle::open(self.ctx(), path, &options.into(), Some(self))?;
        self.rebuild_if_indexed()?;
        Ok(directory)
    }

    pub fn make_file(
        &self,
        name: &str,
        options: impl Into<HandleOptions>,
    ) -> SysobjResult<FileHandle> {
        self.0.object.ensure_live()?;
        let path = self.join(name)?;
        let file = FileHandle::open(self.ctx(), path, &options.into(), Some(self))?;
        self.rebuild_if_indexed()?;
        Ok(file)
    }

    /// Remove every child, indexing first if needed.
    ///
    /// Stops at the first child that cannot be removed; the index is rebuilt either way.
    pub fn clear(&self) -> SysobjResult<()> {
        let children = self.children()?;
        let removed = children.values().try_for_each(|entry| entry.remove());
        let rebuilt = self.rebuild_if_indexed();
        removed.and(rebuilt)
    }

    /// Rebuild the index from a fresh listing now.
    pub fn refresh(&self) -> SysobjResult<()> {
        self.0.object.ensure_live()?;
        if self.0.index.is_indexed() {
            self.rebuild_if_indexed()
        } else {
            self.children().map(|_| ())
        }
    }

    /// Child `name`, waiting up to the configured timeout for it to appear.
    pub fn get(&self, name: &str) -> SysobjResult<Entry> {
        if let Some(entry) = self.lookup(name)? {
            return Ok(entry);
        }
        self.wait_for_child(name, self.ctx().config().wait_timeout())
    }

    /// Wait for a child called `name` to exist, for at most `timeout`.
    ///
    /// Uses a temporary subscription of its own, which is released on every exit path.
    #[instrument(skip(self), fields(directory = %self.path().display()))]
    pub fn wait_for_child(&self, name: &str, timeout: Duration) -> SysobjResult<Entry> {
        validate_child_name(name)?;
        self.0.object.ensure_live()?;
        let (sender, receiver) = mpsc::channel();
        let target = name.to_string();
        let subscription = watch_direct_children(
            self.ctx().pal(),
            self.path(),
            self.0.object.identity().clone(),
            move |change| {
                if change.kind == FileChangeKind::Created && change.name == target {
                    let _ = sender.send(());
                }
            },
        )?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.probe_child(name)? {
                subscription.cancel();
                return Ok(entry);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || receiver.recv_timeout(remaining).is_err() {
                break;
            }
        }
        subscription.cancel();

        if let Some(entry) = self.probe_child(name)? {
            return Ok(entry);
        }
        debug!(?timeout, "child did not appear");
        Err(Box::new(SysobjError::timeout(self.join(name)?, timeout)))
    }

    /// Hide or unhide the directory. On dot-convention platforms the handle is rebuilt for
    /// the renamed path, with a fresh index.
    pub fn hide(&mut self, hidden: bool) -> SysobjResult<()> {
        self.0.object.ensure_live()?;
        let ctx = self.ctx().clone();
        let change = visibility::set_hidden(ctx.pal(), self.path(), self.name(), hidden)?;
        if let VisibilityChange::Renamed(path) = change {
            let options = self.0.object.options_for_reopen();
            *self = DirectoryHandle::open(&ctx, path, &options, None)?;
        }
        Ok(())
    }

    fn probe_child(&self, name: &str) -> SysobjResult<Option<Entry>> {
        let path = self.join(name)?;
        let pal = self.ctx().pal();
        if !pal.path_exists(&path)? {
            return Ok(None);
        }
        let options = HandleOptions::new(CreationMode::Find);
        let entry = if pal.is_directory(&path)? {
            Entry::Directory(DirectoryHandle::open(
                self.ctx(),
                path,
                &options,
                Some(self),
            )?)
        } else {
            Entry::File(FileHandle::open(self.ctx(), path, &options, Some(self))?)
        };
        Ok(Some(entry))
    }

    fn subscribe(&self) -> SysobjResult<()> {
        let weak = self.downgrade();
        let subscription = watch_direct_children(
            self.ctx().pal(),
            self.path(),
            self.0.object.identity().clone(),
            move |change| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let directory = DirectoryHandle(inner);
                if let Err(e) = directory.rebuild_if_indexed() {
                    debug!(
                        path = %directory.path().display(),
                        child = %change.name,
                        error = %e,
                        "rebuild after change notification failed"
                    );
                }
            },
        )?;
        self.0.index.set_subscription(subscription);
        Ok(())
    }

    fn rebuild_if_indexed(&self) -> SysobjResult<()> {
        self.0.object.ensure_live()?;
        let _rebuild = self.0.index.lock_rebuild();
        let Some(previous) = self.0.index.snapshot() else {
            return Ok(());
        };
        let map = self.list_children(Some(&previous))?;
        debug!(path = %self.path().display(), count = map.len(), "rebuilt directory index");
        self.0.index.install(map);
        Ok(())
    }

    /// Build a complete mapping from a fresh listing, reusing handles from `previous`
    /// whose name and kind are unchanged and whose backing object was not replaced.
    fn list_children(&self, previous: Option<&ChildMap>) -> SysobjResult<ChildMap> {
        let ctx = self.ctx();
        let options = HandleOptions::new(CreationMode::Find);
        let mut map = ChildMap::new();
        for listed in ctx.pal().list_directory(self.path())? {
            let kind = if listed.is_directory {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            if let Some(existing) = previous.and_then(|previous| previous.get(&listed.name)) {
                if existing.kind() == kind && existing.object().ensure_live().is_ok() {
                    map.insert(listed.name, existing.clone());
                    continue;
                }
            }
            let path = self.path().join(&listed.name);
            let child = match kind {
                EntryKind::Directory => {
                    DirectoryHandle::open(ctx, path, &options, Some(self)).map(Entry::Directory)
                }
                EntryKind::File => {
                    FileHandle::open(ctx, path, &options, Some(self)).map(Entry::File)
                }
            };
            match child {
                Ok(child) => {
                    map.insert(listed.name, child);
                }
                Err(e) => {
                    debug!(name = %listed.name, error = %e, "skipping entry that changed during listing");
                }
            }
        }
        Ok(map)
    }
}

impl FsObject for DirectoryHandle {
    fn object(&self) -> &ObjectCore {
        &self.0.object
    }

    /// Delete the directory tree and release this directory's subscription.
    fn remove(&self) -> SysobjResult<()> {
        self.0.object.remove()?;
        self.0.index.release();
        Ok(())
    }
}

impl std::fmt::Debug for DirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DirectoryHandle").field(&self.name()).finish()
    }
}
