/* 📖 # Two ways to hide an entry

Some platforms keep a hidden attribute bit on each entry; there hiding flips the bit and
the path stays the same. Everywhere else an entry is hidden by convention when its name
starts with a dot, so hiding is a rename and the handle has to be rebuilt for the new
path. The PAL reports which of the two applies.
*/

use std::path::{Path, PathBuf};

use sysobj_base::{PalHandle, SysobjError, SysobjResult};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityStrategy {
    AttributeBit,
    DotPrefix,
}

impl VisibilityStrategy {
    pub fn for_platform(pal: &PalHandle) -> Self {
        if pal.supports_hidden_attribute() {
            VisibilityStrategy::AttributeBit
        } else {
            VisibilityStrategy::DotPrefix
        }
    }
}

/// What a visibility change did to the entry's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VisibilityChange {
    Unchanged,
    Renamed(PathBuf),
}

pub(crate) fn is_hidden(pal: &PalHandle, path: &Path, name: &str) -> SysobjResult<bool> {
    match VisibilityStrategy::for_platform(pal) {
        VisibilityStrategy::AttributeBit => pal.hidden_attribute(path),
        VisibilityStrategy::DotPrefix => Ok(name.starts_with('.')),
    }
}

pub(crate) fn set_hidden(
    pal: &PalHandle,
    path: &Path,
    name: &str,
    hidden: bool,
) -> SysobjResult<VisibilityChange> {
    if is_hidden(pal, path, name)? == hidden {
        return Ok(VisibilityChange::Unchanged);
    }
    match VisibilityStrategy::for_platform(pal) {
        VisibilityStrategy::AttributeBit => {
            pal.set_hidden_attribute(path, hidden)?;
            debug!(path = %path.display(), hidden, "updated hidden attribute");
            Ok(VisibilityChange::Unchanged)
        }
        VisibilityStrategy::DotPrefix => {
            let target_name = if hidden {
                format!(".{}", name)
            } else {
                name[1..].to_string()
            };
            if matches!(target_name.as_str(), "" | "." | "..") {
                return Err(Box::new(SysobjError::invalid_argument(format!(
                    "cannot unhide '{}' by stripping its dot",
                    name
                ))));
            }
            let target = path.with_file_name(&target_name);
            if pal.path_exists(&target)? {
                return Err(Box::new(SysobjError::already_exists(target)));
            }
            pal.rename(path, &target)?;
            debug!(from = %path.display(), to = %target.display(), "renamed for visibility");
            Ok(VisibilityChange::Renamed(target))
        }
    }
}
