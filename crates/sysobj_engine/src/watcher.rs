/* 📖 # Why re-validate parentage instead of trusting the watcher?

Watch backends differ in what they report for a non-recursive watch: some include events
for deeper paths, some report the watched directory itself, and paths may come back
canonicalized rather than spelled the way the watch was requested. The only reliable
test for "this is one of my direct children" is comparing the filesystem identity of the
changed path's parent with the identity of the watched directory. Everything that fails
that test, including paths whose parent can no longer be stat'ed, is dropped here.
*/

use std::path::Path;

use sysobj_base::{
    FileChangeEvent, FileChangeKind, FileIdentity, PalHandle, SysobjResult, WatchSubscription,
};
use tracing::{debug, trace};

/// A creation or removal of a direct child, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildChange {
    pub kind: FileChangeKind,
    pub name: String,
}

/// Subscribe to `directory` and report only changes to its direct children.
pub fn watch_direct_children(
    pal: &PalHandle,
    directory: &Path,
    identity: FileIdentity,
    on_change: impl Fn(ChildChange) + Send + Sync + 'static,
) -> SysobjResult<WatchSubscription> {
    let filter_pal = pal.clone();
    let watched = directory.to_path_buf();
    pal.watch_directory(
        directory,
        Box::new(move |event: FileChangeEvent| {
            for changed in &event.changed_files {
                let (Some(parent), Some(name)) = (changed.parent(), changed.file_name()) else {
                    continue;
                };
                match filter_pal.file_identity(parent) {
                    Ok(parent_identity) if parent_identity == identity => {
                        debug!(
                            directory = %watched.display(),
                            child = %changed.display(),
                            kind = ?event.kind,
                            "direct child changed"
                        );
                        on_change(ChildChange {
                            kind: event.kind,
                            name: name.to_string_lossy().into_owned(),
                        });
                    }
                    Ok(_) => {
                        trace!(path = %changed.display(), "ignoring change outside directory");
                    }
                    Err(e) => {
                        trace!(path = %changed.display(), error = %e, "ignoring change with unreadable parent");
                    }
                }
            }
        }),
    )
}
