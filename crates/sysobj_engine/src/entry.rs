use std::path::PathBuf;

use sysobj_base::SysobjResult;

use crate::directory::DirectoryHandle;
use crate::file::FileHandle;
use crate::lifecycle::EntryKind;
use crate::object::{FsObject, ObjectCore};

/// A handle of either kind, as found in a directory index.
#[derive(Debug, Clone)]
pub enum Entry {
    File(FileHandle),
    Directory(DirectoryHandle),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Directory(_) => EntryKind::Directory,
        }
    }

    pub fn as_file(&self) -> Option<&FileHandle> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryHandle> {
        match self {
            Entry::File(_) => None,
            Entry::Directory(directory) => Some(directory),
        }
    }

    pub fn hide(&mut self, hidden: bool) -> SysobjResult<()> {
        match self {
            Entry::File(file) => file.hide(hidden),
            Entry::Directory(directory) => directory.hide(hidden),
        }
    }
}

impl FsObject for Entry {
    fn object(&self) -> &ObjectCore {
        match self {
            Entry::File(file) => file.object(),
            Entry::Directory(directory) => directory.object(),
        }
    }

    fn remove(&self) -> SysobjResult<()> {
        match self {
            Entry::File(file) => file.remove(),
            Entry::Directory(directory) => directory.remove(),
        }
    }
}

impl From<FileHandle> for Entry {
    fn from(file: FileHandle) -> Self {
        Entry::File(file)
    }
}

impl From<DirectoryHandle> for Entry {
    fn from(directory: DirectoryHandle) -> Self {
        Entry::Directory(directory)
    }
}

/// Value of a named directory property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Path(PathBuf),
    Flag(bool),
}

/// Result of [`DirectoryHandle::member`]: a property of the handle, or a child.
#[derive(Debug, Clone)]
pub enum Member {
    Property(PropertyValue),
    Child(Entry),
}
