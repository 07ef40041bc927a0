/* 📖 # Why split reconciliation into plan and apply?

A handle is only returned once the requested creation mode has been reconciled against
what is on disk. The decision itself depends on nothing but the mode and a single
existence sample, so `plan` is a pure function that can be checked exhaustively without
a filesystem. `reconcile` samples existence exactly once, asks `plan`, then performs the
mutation. The window between the sample and the mutation is not closed: another process
can create or remove the path in between, and the resulting native error is reported
as-is.
*/

use std::path::Path;

use sysobj_base::{PalHandle, SysobjError, SysobjResult};
use tracing::{debug, instrument};

use crate::context::FsContext;

/// How a handle reconciles with what is on disk when it is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreationMode {
    /// The path must already exist.
    Find,
    /// The path must not exist yet; it is created.
    Create,
    /// Use the path if it exists, create it otherwise.
    #[default]
    Update,
    /// Replace whatever is there with a fresh, empty entry.
    Overwrite,
}

/// The filesystem mutation chosen for a mode and an existence sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Keep,
    Create,
    Replace,
}

/// File or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn describe(self) -> &'static str {
        match self {
            EntryKind::File => "a file",
            EntryKind::Directory => "a directory",
        }
    }
}

/// Options for constructing a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleOptions {
    pub mode: CreationMode,
    /// Protected handles refuse removal, including the removal half of OVERWRITE.
    pub protected: bool,
}

impl HandleOptions {
    pub fn new(mode: CreationMode) -> Self {
        Self {
            mode,
            protected: false,
        }
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }
}

impl From<CreationMode> for HandleOptions {
    fn from(mode: CreationMode) -> Self {
        Self::new(mode)
    }
}

/// Decide what to do for `mode` given whether `path` exists.
pub fn plan(mode: CreationMode, exists: bool, path: &Path) -> SysobjResult<PlannedAction> {
    match (mode, exists) {
        (CreationMode::Find, false) => Err(Box::new(SysobjError::not_found(path))),
        (CreationMode::Find, true) => Ok(PlannedAction::Keep),
        (CreationMode::Create, true) => Err(Box::new(SysobjError::already_exists(path))),
        (CreationMode::Create, false) => Ok(PlannedAction::Create),
        (CreationMode::Update, true) => Ok(PlannedAction::Keep),
        (CreationMode::Update, false) => Ok(PlannedAction::Create),
        (CreationMode::Overwrite, true) => Ok(PlannedAction::Replace),
        (CreationMode::Overwrite, false) => Ok(PlannedAction::Create),
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub existed_before: bool,
    pub action: PlannedAction,
}

/// Sample existence once, plan, and apply the plan.
#[instrument(skip(ctx, options), fields(path = %path.display(), ?kind, mode = ?options.mode))]
pub(crate) fn reconcile(
    ctx: &FsContext,
    path: &Path,
    kind: EntryKind,
    options: &HandleOptions,
) -> SysobjResult<Reconciled> {
    let pal = ctx.pal();
    let exists = pal.path_exists(path)?;
    if exists {
        let actual = if pal.is_directory(path)? {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        if actual != kind {
            return Err(Box::new(SysobjError::invalid_argument(format!(
                "{} is {}, expected {}",
                path.display(),
                actual.describe(),
                kind.describe()
            ))));
        }
    }

    let action = plan(options.mode, exists, path)?;
    apply(ctx, path, kind, action, options.protected)?;
    debug!(exists, ?action, "reconciled handle");
    Ok(Reconciled {
        existed_before: exists,
        action,
    })
}

fn apply(
    ctx: &FsContext,
    path: &Path,
    kind: EntryKind,
    action: PlannedAction,
    protected: bool,
) -> SysobjResult<()> {
    let pal = ctx.pal();
    match action {
        PlannedAction::Keep => return Ok(()),
        PlannedAction::Create => {}
        PlannedAction::Replace => {
            if protected {
                return Err(Box::new(SysobjError::permission_denied(
                    path,
                    "cannot overwrite a protected entry",
                )));
            }
            debug!("removing existing entry before recreating it");
            remove_entry(pal, path, kind)?;
        }
    }
    match kind {
        EntryKind::File => pal.create_file(path)?,
        EntryKind::Directory => pal.create_directory(path)?,
    }
    ctx.creation_log().record(path);
    Ok(())
}

pub(crate) fn remove_entry(pal: &PalHandle, path: &Path, kind: EntryKind) -> SysobjResult<()> {
    match kind {
        EntryKind::File => pal.remove_file(path),
        EntryKind::Directory => pal.remove_directory_all(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use sysobj_base::{ErrorKind, MockPal, Pal};

    fn context() -> (MockPal, FsContext) {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));
        (mock, ctx)
    }

    #[test]
    fn test_plan_table() {
        let modes = [
            CreationMode::Find,
            CreationMode::Create,
            CreationMode::Update,
            CreationMode::Overwrite,
        ];
        let mut table = String::new();
        for mode in modes {
            for exists in [false, true] {
                let outcome = match plan(mode, exists, Path::new("/p")) {
                    Ok(action) => format!("{:?}", action),
                    Err(e) => format!("error: {}", e),
                };
                table.push_str(&format!("{:?} exists={} -> {}\n", mode, exists, outcome));
            }
        }
        expect![[r#"
            Find exists=false -> error: Not found: /p
            Find exists=true -> Keep
            Create exists=false -> Create
            Create exists=true -> error: Already exists: /p
            Update exists=false -> Create
            Update exists=true -> Keep
            Overwrite exists=false -> Create
            Overwrite exists=true -> Replace
        "#]]
        .assert_eq(&table);
    }

    #[test]
    fn test_create_on_existing_path_does_not_mutate() {
        let (mock, ctx) = context();
        mock.add_file("/work/keep.txt", b"data".to_vec());

        let error = reconcile(
            &ctx,
            Path::new("/work/keep.txt"),
            EntryKind::File,
            &CreationMode::Create.into(),
        )
        .unwrap_err();

        assert!(matches!(error.kind(), ErrorKind::AlreadyExists { .. }));
        assert_eq!(mock.file_content("/work/keep.txt"), Some(b"data".to_vec()));
        assert_eq!(ctx.creation_log().count(), 0);
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let (mock, ctx) = context();
        mock.add_file("/work/old/stale.txt", vec![]);

        let outcome = reconcile(
            &ctx,
            Path::new("/work/old"),
            EntryKind::Directory,
            &CreationMode::Overwrite.into(),
        )
        .unwrap();

        assert_eq!(outcome.action, PlannedAction::Replace);
        assert!(outcome.existed_before);
        assert!(mock.path_exists(Path::new("/work/old")).unwrap());
        assert!(!mock.path_exists(Path::new("/work/old/stale.txt")).unwrap());
        assert_eq!(ctx.creation_log().paths(), vec![std::path::PathBuf::from("/work/old")]);
    }

    #[test]
    fn test_overwrite_refused_when_protected() {
        let (mock, ctx) = context();
        mock.add_file("/work/precious.txt", b"keep".to_vec());

        let error = reconcile(
            &ctx,
            Path::new("/work/precious.txt"),
            EntryKind::File,
            &HandleOptions::new(CreationMode::Overwrite).protected(true),
        )
        .unwrap_err();

        assert!(matches!(error.kind(), ErrorKind::PermissionDenied { .. }));
        assert_eq!(mock.file_content("/work/precious.txt"), Some(b"keep".to_vec()));
    }

    #[test]
    fn test_wrong_kind_is_invalid_argument() {
        let (mock, ctx) = context();
        mock.add_file("/work/plain.txt", vec![]);

        let error = reconcile(
            &ctx,
            Path::new("/work/plain.txt"),
            EntryKind::Directory,
            &CreationMode::Update.into(),
        )
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Invalid argument: /work/plain.txt is a file, expected a directory"
        );
    }

    #[test]
    fn test_update_keeps_existing_data() {
        let (mock, ctx) = context();
        mock.add_file("/work/notes.txt", b"hello".to_vec());

        let outcome = reconcile(
            &ctx,
            Path::new("/work/notes.txt"),
            EntryKind::File,
            &HandleOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.action, PlannedAction::Keep);
        assert_eq!(mock.file_content("/work/notes.txt"), Some(b"hello".to_vec()));
    }
}
