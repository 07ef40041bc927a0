/* 📖 # Why have sysobj_base as a core library?
sysobj_base provides the error type, tracing setup and the platform abstraction layer
that the handle engine is written against. Keeping the native filesystem and watcher
code here lets the engine be tested against an in-memory platform.
*/

pub mod error;
mod error_tests;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, ResultExt, SysobjError, SysobjResult};
pub use pal::{
    DirectoryEntry, FileChangeCallback, FileChangeEvent, FileChangeKind, FileIdentity, MockPal,
    Pal, PalHandle, ReadSeek, RealPal, WatchSubscription, WriteMode,
};
