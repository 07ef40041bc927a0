/* 📖 # End-to-end scenarios

These tests drive several handles together the way an application would: build a small
tree, let notifications flow, and check what the indexes and the platform end up
holding. Most run against MockPal for determinism; the last group runs against RealPal
in a temporary directory so the `notify` path is exercised too.
*/

#[cfg(test)]
mod mock_scenarios {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use expect_test::expect;
    use sysobj_base::{ErrorKind, FileChangeKind, MockPal, Pal, PalHandle, WriteMode};

    use crate::{CreationMode, DirectoryHandle, FsContext, FsObject, HandleOptions};

    fn render(directory: &DirectoryHandle) -> String {
        let mut out = String::new();
        for (name, entry) in directory.children().unwrap().iter() {
            out.push_str(&format!("{} -> {:?}\n", name, entry));
        }
        out
    }

    #[test]
    fn test_overwrite_directory_then_add_two_files() {
        let mock = MockPal::new();
        mock.add_file("/work/arg/stale.txt", b"old".to_vec());
        mock.add_directory("/work/arg/stale_dir");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));
        ctx.designate_root("/work").unwrap();

        let arg = ctx
            .open_directory_in("/work", "arg", CreationMode::Overwrite)
            .unwrap();
        arg.make_file("hello.txt", CreationMode::Create).unwrap();
        arg.make_file("world.txt", CreationMode::Create).unwrap();

        expect![[r#"
            hello.txt -> File(FileHandle("hello.txt"))
            world.txt -> File(FileHandle("world.txt"))
        "#]]
        .assert_eq(&render(&arg));
        assert!(arg.existed_before_construction());
        assert_eq!(ctx.creation_log().count(), 3);
    }

    #[test]
    fn test_protected_directory_survives_remove() {
        let mock = MockPal::new();
        mock.add_file("/work/keep/data.txt", vec![]);
        let ctx = FsContext::new(PalHandle::new(mock.clone()));

        let keep = ctx
            .open_directory(
                "/work/keep",
                HandleOptions::new(CreationMode::Find).protected(true),
            )
            .unwrap();

        let error = keep.remove().unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::PermissionDenied { .. }));
        assert!(mock.path_exists(Path::new("/work/keep/data.txt")).unwrap());
        assert!(keep.exists().unwrap());
    }

    #[test]
    fn test_waiting_for_missing_child_times_out_and_unsubscribes() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));
        let work = ctx.open_directory("/work", CreationMode::Find).unwrap();
        work.children().unwrap();
        let watches_before = mock.active_watch_count();

        let error = work
            .wait_for_child("never.txt", Duration::from_millis(200))
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Timed out after 200ms waiting for /work/never.txt"
        );
        assert_eq!(mock.active_watch_count(), watches_before);
    }

    #[test]
    fn test_configured_timeout_applies_to_get() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let config = crate::EngineConfig {
            wait_timeout_ms: 50,
        };
        let ctx = FsContext::with_config(PalHandle::new(mock.clone()), config);
        let work = ctx.open_directory("/work", CreationMode::Find).unwrap();

        let error = work.get("absent").unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Timeout { .. }));
    }

    #[test]
    fn test_native_creations_then_one_notification() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));
        let work = ctx.open_directory("/work", CreationMode::Find).unwrap();
        work.children().unwrap();

        for index in 0..4 {
            mock.add_file(format!("/work/file_{index}.dat"), vec![]);
        }
        mock.add_directory("/work/nested");
        mock.emit_change(FileChangeKind::Created, "/work/nested");

        expect![[r#"
            file_0.dat -> File(FileHandle("file_0.dat"))
            file_1.dat -> File(FileHandle("file_1.dat"))
            file_2.dat -> File(FileHandle("file_2.dat"))
            file_3.dat -> File(FileHandle("file_3.dat"))
            nested -> Directory(DirectoryHandle("nested"))
        "#]]
        .assert_eq(&render(&work));
    }

    #[test]
    fn test_readers_never_see_a_partial_rebuild() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));
        let work = ctx.open_directory("/work", CreationMode::Find).unwrap();
        work.children().unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let work = work.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut observed = Vec::new();
                    while !done.load(Ordering::SeqCst) {
                        observed.push(work.children().unwrap().len());
                    }
                    observed.push(work.children().unwrap().len());
                    observed
                })
            })
            .collect();

        for index in 0..10 {
            mock.add_file(format!("/work/batch_{index}.txt"), vec![]);
        }
        mock.emit_change(FileChangeKind::Created, "/work/batch_9.txt");
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            let observed = reader.join().unwrap();
            assert!(observed.iter().all(|len| *len == 0 || *len == 10));
            assert_eq!(observed.last(), Some(&10));
        }
    }

    #[test]
    fn test_update_twice_keeps_data() {
        let mock = MockPal::new();
        mock.add_directory("/work");
        let ctx = FsContext::new(PalHandle::new(mock.clone()));

        let first = ctx.open_directory("/work/docs", CreationMode::Update).unwrap();
        first
            .make_file("readme.md", CreationMode::Create)
            .unwrap()
            .write("hi", WriteMode::Truncate)
            .unwrap();
        let second = ctx.open_directory("/work/docs", CreationMode::Update).unwrap();

        assert!(second.existed_before_construction());
        let readme = second.lookup("readme.md").unwrap().unwrap();
        assert_eq!(readme.as_file().unwrap().read_to_string().unwrap(), "hi");
        assert_eq!(ctx.creation_log().count(), 2);
    }
}

#[cfg(test)]
mod real_scenarios {
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    use sysobj_base::{ErrorKind, PalHandle, RealPal};
    use tempfile::TempDir;

    use crate::{CreationMode, DirectoryHandle, FsContext, FsObject};

    fn context() -> (TempDir, FsContext) {
        let temp = TempDir::new().unwrap();
        let ctx = FsContext::new(PalHandle::new(RealPal::new(temp.path().to_path_buf())));
        (temp, ctx)
    }

    fn names(directory: &DirectoryHandle) -> Vec<String> {
        directory.children().unwrap().keys().cloned().collect()
    }

    /// Poll until the index satisfies `done`, since notify delivers on its own thread.
    fn eventually(directory: &DirectoryHandle, done: impl Fn(&[String]) -> bool) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let current = names(directory);
            if done(&current) || Instant::now() > deadline {
                return current;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_scenario_on_real_filesystem() {
        let (temp, ctx) = context();
        std::fs::create_dir(temp.path().join("arg")).unwrap();
        std::fs::write(temp.path().join("arg/stale.txt"), "old").unwrap();
        ctx.designate_root(temp.path()).unwrap();

        let arg = ctx
            .open_directory_in(temp.path(), "arg", CreationMode::Overwrite)
            .unwrap();
        arg.make_file("hello.txt", CreationMode::Create).unwrap();
        arg.make_file("world.txt", CreationMode::Create).unwrap();

        assert_eq!(names(&arg), vec!["hello.txt", "world.txt"]);
    }

    #[test]
    fn test_external_creation_reaches_index() {
        let (temp, ctx) = context();
        let work = ctx.open_directory("work", CreationMode::Create).unwrap();
        assert!(names(&work).is_empty());

        std::fs::write(temp.path().join("work/external.txt"), "x").unwrap();
        std::fs::create_dir(temp.path().join("work/external_dir")).unwrap();

        let seen = eventually(&work, |names| names.len() == 2);
        assert_eq!(seen, vec!["external.txt", "external_dir"]);
    }

    #[test]
    fn test_nested_creation_does_not_change_index() {
        let (temp, ctx) = context();
        let work = ctx.open_directory("work", CreationMode::Create).unwrap();
        work.make_subdirectory("sub", CreationMode::Create).unwrap();
        assert_eq!(names(&work), vec!["sub"]);

        std::fs::write(temp.path().join("work/sub/deep.txt"), "x").unwrap();
        thread::sleep(Duration::from_millis(200));

        assert_eq!(names(&work), vec!["sub"]);
    }

    // Other platforms identify entries by canonical path, which a replacement keeps.
    #[cfg(unix)]
    #[test]
    fn test_directory_replaced_on_disk_is_stale_and_reindexed() {
        let (temp, ctx) = context();
        let work = ctx.open_directory("work", CreationMode::Create).unwrap();
        let sub = work.make_subdirectory("sub", CreationMode::Create).unwrap();
        assert!(sub.children().unwrap().is_empty());
        assert_eq!(names(&work), vec!["sub"]);

        std::fs::rename(temp.path().join("work/sub"), temp.path().join("parked")).unwrap();
        std::fs::create_dir(temp.path().join("work/sub")).unwrap();

        let error = sub.children().unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::StaleHandle { .. }));

        let fresh = ctx.open_directory("work/sub", CreationMode::Find).unwrap();
        assert!(fresh.children().unwrap().is_empty());
        std::fs::write(temp.path().join("work/sub/a.txt"), "x").unwrap();
        assert_eq!(eventually(&fresh, |names| names.len() == 1), vec!["a.txt"]);

        work.refresh().unwrap();
        let indexed = work.lookup("sub").unwrap().unwrap();
        assert!(!indexed.as_directory().unwrap().same_handle(&sub));
        assert_eq!(names(indexed.as_directory().unwrap()), vec!["a.txt"]);
    }

    #[test]
    fn test_wait_for_child_on_real_filesystem() {
        let (temp, ctx) = context();
        let work = ctx.open_directory("work", CreationMode::Create).unwrap();
        let target: PathBuf = temp.path().join("work/late.txt");
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            std::fs::write(target, "done").unwrap();
        });

        let entry = work
            .wait_for_child("late.txt", Duration::from_secs(5))
            .unwrap();
        writer.join().unwrap();

        assert_eq!(entry.name(), "late.txt");
        assert_eq!(
            entry.as_file().unwrap().read_to_string().unwrap(),
            "done"
        );
    }
}
