use std::path::{Path, PathBuf};

use relative_path::{Component, RelativePath};
use sysobj_base::{PalHandle, SysobjError, SysobjResult};

use crate::directory::DirectoryHandle;
use crate::object::FsObject;

/// Where a parent-relative name is resolved against.
#[derive(Debug, Clone, Copy)]
pub enum Parent<'a> {
    Handle(&'a DirectoryHandle),
    Path(&'a Path),
}

fn invalid_name(name: &str) -> Box<SysobjError> {
    Box::new(SysobjError::invalid_argument(format!(
        "'{}' is not a single path segment",
        name
    )))
}

/// Check that `name` is exactly one normal path segment.
pub fn validate_child_name(name: &str) -> SysobjResult<&str> {
    if name.contains(['/', '\\']) {
        return Err(invalid_name(name));
    }
    let mut components = RelativePath::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == name => Ok(name),
        _ => Err(invalid_name(name)),
    }
}

/// Compute the absolute path for `given`.
///
/// Without a parent, `given` is normalized lexically against the platform's base
/// directory. With a parent, `given` must be a single segment; a raw parent path must be
/// an existing directory.
pub fn resolve(
    pal: &PalHandle,
    parent: Option<Parent<'_>>,
    given: &Path,
) -> SysobjResult<PathBuf> {
    let Some(parent) = parent else {
        return pal.absolute_path(given);
    };
    let name = given
        .to_str()
        .ok_or_else(|| invalid_name(&given.to_string_lossy()))?;
    let name = validate_child_name(name)?;
    match parent {
        Parent::Handle(directory) => Ok(directory.path().join(name)),
        Parent::Path(raw) => {
            let raw = pal.absolute_path(raw)?;
            if !pal.is_directory(&raw)? {
                return Err(Box::new(SysobjError::invalid_argument(format!(
                    "parent {} is not an existing directory",
                    raw.display()
                ))));
            }
            Ok(raw.join(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysobj_base::{ErrorKind, MockPal};

    fn handle(mock: &MockPal) -> PalHandle {
        PalHandle::new(mock.clone())
    }

    #[test]
    fn test_single_segment_names() {
        for name in ["a.txt", ".hidden", "..dots", "name."] {
            assert_eq!(validate_child_name(name).unwrap(), name);
        }
    }

    #[test]
    fn test_rejected_names() {
        for name in ["", ".", "..", "a/b", "/abs", "a\\b", "trailing/"] {
            let error = validate_child_name(name).unwrap_err();
            assert!(
                matches!(error.kind(), ErrorKind::InvalidArgument { .. }),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_without_parent_normalizes() {
        let pal = handle(&MockPal::new().with_current_dir("/work"));

        assert_eq!(
            resolve(&pal, None, Path::new("a/./b/../c")).unwrap(),
            PathBuf::from("/work/a/c")
        );
        assert_eq!(
            resolve(&pal, None, Path::new("/x/y")).unwrap(),
            PathBuf::from("/x/y")
        );
    }

    #[test]
    fn test_resolve_with_raw_parent() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        mock.add_file("/work/file.txt", vec![]);
        let pal = handle(&mock);

        assert_eq!(
            resolve(&pal, Some(Parent::Path(Path::new("/work"))), Path::new("n")).unwrap(),
            PathBuf::from("/work/n")
        );
        assert!(resolve(&pal, Some(Parent::Path(Path::new("/work/file.txt"))), Path::new("n")).is_err());
        assert!(resolve(&pal, Some(Parent::Path(Path::new("/missing"))), Path::new("n")).is_err());
        assert!(resolve(&pal, Some(Parent::Path(Path::new("/work"))), Path::new("a/b")).is_err());
    }
}
