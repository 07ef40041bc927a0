use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use sysobj_base::{SysobjError, SysobjResult, WriteMode};
use tracing::{debug, instrument};

use crate::context::FsContext;
use crate::directory::DirectoryHandle;
use crate::lifecycle::{EntryKind, HandleOptions};
use crate::object::{FsObject, ObjectCore};
use crate::visibility::{self, VisibilityChange};

/// Suffix of `name` starting at the last dot, or `""`.
///
/// Leading dots do not start an extension: `.bashrc` has none, `archive.tar.gz` has
/// `.gz`, and `name.` has `.`.
pub fn split_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => &name[dot..],
        _ => "",
    }
}

pub struct FileInner {
    object: ObjectCore,
    extension: String,
}

/// Handle to a regular file.
#[derive(Clone)]
pub struct FileHandle(Arc<FileInner>);

impl FileHandle {
    pub(crate) fn open(
        ctx: &FsContext,
        path: PathBuf,
        options: &HandleOptions,
        parent: Option<&DirectoryHandle>,
    ) -> SysobjResult<Self> {
        let object = ObjectCore::construct(ctx, path, EntryKind::File, options)?;
        if let Some(parent) = parent {
            object.set_parent(parent);
        }
        let extension = split_extension(object.name()).to_string();
        if extension.is_empty() {
            debug!(path = %object.path().display(), "file has no extension");
        }
        Ok(Self(Arc::new(FileInner { object, extension })))
    }

    /// Extension including the leading dot, or `""`.
    pub fn extension(&self) -> &str {
        &self.0.extension
    }

    /// Read the whole file.
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn read(&self) -> SysobjResult<Vec<u8>> {
        self.0.object.ensure_live()?;
        self.0.object.ctx().pal().read_file_to_bytes(self.path())
    }

    /// Read the whole file as UTF-8 text.
    pub fn read_to_string(&self) -> SysobjResult<String> {
        self.0.object.ensure_live()?;
        self.0.object.ctx().pal().read_file_to_string(self.path())
    }

    /// Replace or extend the contents.
    #[instrument(skip(self, data), fields(path = %self.path().display(), ?mode))]
    pub fn write(&self, data: impl AsRef<[u8]>, mode: WriteMode) -> SysobjResult<()> {
        self.0.object.ensure_live()?;
        let path = self.path();
        let data = data.as_ref();
        let mut writer = self
            .0
            .object
            .ctx()
            .pal()
            .open_file_for_write(path, mode)?;
        writer
            .write_all(data)
            .and_then(|()| writer.flush())
            .map_err(|e| Box::new(SysobjError::file_error(path, e)))?;
        drop(writer);
        debug!(bytes = data.len(), "wrote file");
        Ok(())
    }

    /// Hide or unhide the file. On dot-convention platforms the handle is rebuilt for the
    /// renamed path.
    pub fn hide(&mut self, hidden: bool) -> SysobjResult<()> {
        self.0.object.ensure_live()?;
        let ctx = self.0.object.ctx().clone();
        let change = visibility::set_hidden(ctx.pal(), self.path(), self.name(), hidden)?;
        if let VisibilityChange::Renamed(path) = change {
            let options = self.0.object.options_for_reopen();
            *self = FileHandle::open(&ctx, path, &options, None)?;
        }
        Ok(())
    }

    /// Whether both handles are clones of one another.
    pub fn same_handle(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FsObject for FileHandle {
    fn object(&self) -> &ObjectCore {
        &self.0.object
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FileHandle").field(&self.name()).finish()
    }
}
