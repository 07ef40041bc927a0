/* 📖 # What is the Platform Abstraction Layer?

The PAL provides a trait-based abstraction over filesystem and watch operations.
Handles never call `std::fs` or `notify` directly, so:
- MockPal allows deterministic unit tests without filesystem access
- RealPal keeps the native calls in one place
- All filesystem operations use the same error handling
*/

pub mod mock;
pub mod real_pal;
mod traits;

pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{
    DirectoryEntry, FileChangeCallback, FileChangeEvent, FileChangeKind, FileIdentity, Pal,
    PalHandle, ReadSeek, WatchSubscription, WriteMode,
};
