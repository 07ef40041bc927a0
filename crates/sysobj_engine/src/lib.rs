/* 📖 # What is sysobj_engine?

Typed, long-lived handles over filesystem entries. A handle is constructed with a
creation mode that is reconciled against the disk exactly once; directory handles keep a
lazily built index of their children that change notifications keep current without
rescanning on every lookup. All platform access goes through the PAL from sysobj_base.
*/

pub mod config;
pub mod context;
mod directory;
mod entry;
mod file;
mod index;
pub mod lifecycle;
mod object;
pub mod path;
mod scenario_tests;
pub mod visibility;
pub mod watcher;

pub use config::{DEFAULT_WAIT_TIMEOUT_MS, EngineConfig, load_config, parse_config};
pub use context::{CreationLog, FsContext};
pub use directory::{DirectoryHandle, PROPERTY_NAMES};
pub use entry::{Entry, Member, PropertyValue};
pub use file::{FileHandle, split_extension};
pub use index::ChildMap;
pub use lifecycle::{CreationMode, EntryKind, HandleOptions, PlannedAction, plan};
pub use object::FsObject;
pub use visibility::VisibilityStrategy;
pub use watcher::{ChildChange, watch_direct_children};
