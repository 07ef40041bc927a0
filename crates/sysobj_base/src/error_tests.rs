/* 📖 # Why use a separate file for these error tests?

Some of these tests install a tracing subscriber and inspect span traces.
Keeping them apart from the error module keeps that setup out of the module itself.
*/

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{ResultExt, SysobjError, SysobjResult};
    use expect_test::expect;
    use std::error::Error;
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;
    use tracing::span;
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Set up tracing with ErrorLayer for tests.
    /// Uses `try_init()` to handle multiple tests running concurrently.
    fn setup_tracing_subscriber() {
        let _ = tracing_subscriber::registry()
            .with(ErrorLayer::default())
            .try_init();
    }

    #[test]
    fn test_error_from_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let path = PathBuf::from("test.txt");
        let error = SysobjError::file_error(path.clone(), io_err);

        match error.kind() {
            ErrorKind::FileError { path: p, .. } => {
                assert_eq!(p, &path);
            }
            _ => panic!("Expected FileError variant"),
        }
    }

    #[test]
    fn test_constructors_produce_matching_kinds() {
        assert!(matches!(
            SysobjError::not_found("/a").kind(),
            ErrorKind::NotFound { .. }
        ));
        assert!(matches!(
            SysobjError::already_exists("/a").kind(),
            ErrorKind::AlreadyExists { .. }
        ));
        assert!(matches!(
            SysobjError::invalid_argument("bad").kind(),
            ErrorKind::InvalidArgument { .. }
        ));
        assert!(matches!(
            SysobjError::permission_denied("/a", "protected").kind(),
            ErrorKind::PermissionDenied { .. }
        ));
        assert!(matches!(
            SysobjError::stale_handle("/a").kind(),
            ErrorKind::StaleHandle { .. }
        ));
        assert!(matches!(
            SysobjError::timeout("/a/b", Duration::from_millis(200)).kind(),
            ErrorKind::Timeout { .. }
        ));
    }

    #[test]
    fn test_error_context_attachment() {
        let error = SysobjError::message("original error")
            .context("first context")
            .context("second context");

        assert_eq!(error.get_context().len(), 2);
        assert_eq!(error.get_context()[0], "first context");
        assert_eq!(error.get_context()[1], "second context");
    }

    #[test]
    fn test_error_display_with_multiple_contexts() {
        let error = SysobjError::message("root error")
            .context("first")
            .context("second")
            .context("third");
        assert_eq!(error.to_string(), "first: second: third: root error");
    }

    #[test]
    fn test_error_display_kinds() {
        assert_eq!(
            SysobjError::timeout("/work/late.txt", Duration::from_millis(200)).to_string(),
            "Timed out after 200ms waiting for /work/late.txt"
        );
        assert_eq!(
            SysobjError::permission_denied("/work", "handle is protected").to_string(),
            "Permission denied for /work: handle is protected"
        );
        assert_eq!(
            SysobjError::stale_handle("/gone").to_string(),
            "Stale handle, backing path is gone: /gone"
        );
    }

    #[test]
    fn test_error_source_file_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error = SysobjError::file_error("test.txt", io_err);
        assert!(error.source().is_some());
        assert_eq!(error.root_cause().to_string(), "access denied");
    }

    #[test]
    fn test_error_source_is_cause() {
        let error = SysobjError::message("outer").caused_by(SysobjError::message("inner"));
        assert_eq!(error.source().map(|e| e.to_string()), Some("inner".into()));
        assert_eq!(error.root_cause().to_string(), "inner");
    }

    #[test]
    fn test_result_ext_chaining() {
        let result: SysobjResult<i32> = Err(Box::new(SysobjError::message("root")));
        let err = result
            .context("step 1")
            .with_context(|| "step 2".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "step 1: step 2: root");
    }

    #[test]
    fn test_err_macro() {
        let error = crate::err!("value {} out of range", 7);
        assert_eq!(error.to_string(), "value 7 out of range");
    }

    #[test]
    fn test_bail_macro() {
        fn fails() -> SysobjResult<()> {
            crate::bail!("giving up on {}", "this");
        }
        assert_eq!(fails().unwrap_err().to_string(), "giving up on this");
    }

    #[test]
    fn test_debug_nested_errors() {
        let inner_error = SysobjError::not_found("/work/missing").context("inner context");
        let outer_error = SysobjError::message("outer error")
            .context("outer context")
            .caused_by(inner_error);

        expect![[r#"
            outer error
            ├─ outer context
            └─ cause: Not found: /work/missing
               └─ inner context
        "#]]
        .assert_debug_eq(&outer_error);
    }

    #[test]
    fn test_debug_multiple_nested_errors() {
        let error_1 = SysobjError::message("error 1").context("context 1");
        let error_2 = SysobjError::message("error 2")
            .context("context 2")
            .caused_by(error_1);
        let error_3 = SysobjError::message("error 3")
            .context("context 3a")
            .context("context 3b")
            .caused_by(error_2);

        expect![[r#"
            error 3
            ├─ context 3a
            ├─ context 3b
            └─ cause: error 2
               ├─ context 2
               └─ cause: error 1
                  └─ context 1
        "#]]
        .assert_debug_eq(&error_3);
    }

    #[test]
    fn test_spantrace_is_rendered_in_debug_output() {
        setup_tracing_subscriber();

        let operation_span = span!(tracing::Level::DEBUG, "reconcile_handle", mode = "create");
        let _guard = operation_span.enter();

        let error = SysobjError::already_exists("/work/arg");
        let rendered = format!("{:?}", error);

        assert!(rendered.starts_with("Already exists: /work/arg"));
        assert!(rendered.contains("Trace:"));
        assert!(rendered.contains("reconcile_handle"));
    }
}
