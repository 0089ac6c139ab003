//! Credential store tests.

use std::{io::Write, sync::Arc};
use vncgate_auth::{
    CredentialError, CredentialSlot, CredentialSource, CredentialStore, ReloadOutcome, SlotSource,
    Tier,
};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn file_source(path: &std::path::Path) -> CredentialSource {
    CredentialSource::file(path.to_str().unwrap())
}

#[test]
fn full_and_view_only_slots() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "passwd",
        "# operator passwords\nalpha\nsecond\n__BEGIN_VIEWONLY__\nbeta\n",
    );
    let store = CredentialStore::load(file_source(&path)).unwrap();
    let snapshot = store.snapshot();

    let tiers: Vec<Tier> = snapshot.slots().iter().map(|s| s.tier).collect();
    assert_eq!(tiers, [Tier::Full, Tier::Full, Tier::ViewOnly]);
    assert_eq!(snapshot.primary().unwrap().secret.expose(), b"alpha");
    assert_eq!(snapshot.count(Tier::ViewOnly), 1);
    assert!(
        snapshot
            .slots()
            .iter()
            .all(|s| s.source == SlotSource::File)
    );
}

#[test]
fn grammar_markers() {
    let text = "__COMM__ a comment\n__SKIP__\n__EMPTY__\n\nreal\n";
    let store = CredentialStore::load(CredentialSource::inline(text)).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.slots().len(), 2);
    assert!(snapshot.slots()[0].secret.is_empty());
    assert_eq!(snapshot.slots()[1].secret.expose(), b"real");
    assert_eq!(snapshot.slots()[1].source, SlotSource::Inline);
}

#[test]
fn whitespace_is_part_of_the_secret() {
    let store = CredentialStore::load(CredentialSource::inline(" padded \n")).unwrap();
    assert_eq!(store.snapshot().slots()[0].secret.expose(), b" padded ");
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CredentialStore::load(file_source(&dir.path().join("nope"))).unwrap_err();
    assert!(matches!(err, CredentialError::MissingFile { .. }));
}

#[test]
fn directory_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let err = CredentialStore::load(file_source(dir.path())).unwrap_err();
    assert!(matches!(err, CredentialError::UnreadableFile { .. }));
}

#[test]
fn empty_file_is_empty_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "");
    let err = CredentialStore::load(file_source(&path)).unwrap_err();
    assert!(matches!(err, CredentialError::EmptyCredentials));

    let path = write_file(&dir, "comments", "# nothing here\n__SKIP__\n");
    let err = CredentialStore::load(file_source(&path)).unwrap_err();
    assert!(matches!(err, CredentialError::EmptyCredentials));
}

#[test]
fn view_only_without_full_is_malformed() {
    let err = CredentialStore::load(CredentialSource::inline("__BEGIN_VIEWONLY__\nbeta\n"))
        .unwrap_err();
    assert!(matches!(err, CredentialError::MalformedSpec { .. }));
}

#[test]
fn repeated_marker_is_malformed() {
    let text = "alpha\n__BEGIN_VIEWONLY__\nbeta\n__BEGIN_VIEWONLY__\ngamma\n";
    let err = CredentialStore::load(CredentialSource::inline(text)).unwrap_err();
    match err {
        CredentialError::MalformedSpec { reason } => assert!(reason.contains("line 4")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn disabled_store_is_empty() {
    let store = CredentialStore::disabled();
    assert!(store.snapshot().is_disabled());
    assert_eq!(store.reload(true).unwrap(), ReloadOutcome::NotModified);
}

#[test]
fn unmodified_reload_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();
    let before = store.snapshot();

    assert_eq!(store.reload(false).unwrap(), ReloadOutcome::NotModified);
    assert_eq!(store.reload(false).unwrap(), ReloadOutcome::NotModified);

    let after = store.snapshot();
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn modified_file_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();

    write_file(&dir, "passwd", "omega\n__BEGIN_VIEWONLY__\nbeta\n");
    let outcome = store.reload(false).unwrap();
    assert_eq!(outcome, ReloadOutcome::Reloaded { generation: 2 });

    let snapshot = store.snapshot();
    assert_eq!(snapshot.primary().unwrap().secret.expose(), b"omega");
    assert_eq!(snapshot.count(Tier::ViewOnly), 1);
}

#[test]
fn same_size_and_mtime_skips_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

    write_file(&dir, "passwd", "omega\n");
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
    assert_eq!(store.reload(false).unwrap(), ReloadOutcome::NotModified);
    assert_eq!(
        store.snapshot().primary().unwrap().secret.expose(),
        b"alpha"
    );

    assert_eq!(
        store.reload(true).unwrap(),
        ReloadOutcome::Reloaded { generation: 2 }
    );
    assert_eq!(
        store.snapshot().primary().unwrap().secret.expose(),
        b"omega"
    );
}

#[test]
fn forced_reload_always_reparses() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();

    let outcome = store.reload(true).unwrap();
    assert_eq!(outcome, ReloadOutcome::Reloaded { generation: 2 });
    assert_eq!(store.snapshot().generation(), 2);
}

#[test]
fn malformed_reload_keeps_previous_slots() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();
    let before = store.snapshot();

    write_file(&dir, "passwd", "__BEGIN_VIEWONLY__\nbeta\n");
    let err = store.reload(false).unwrap_err();
    assert!(matches!(err, CredentialError::ReloadFailed { .. }));
    assert!(Arc::ptr_eq(&before, &store.snapshot()));

    std::fs::remove_file(&path).unwrap();
    let err = store.reload(true).unwrap_err();
    match err {
        CredentialError::ReloadFailed { source, .. } => {
            assert!(matches!(*source, CredentialError::MissingFile { .. }))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        store.snapshot().primary().unwrap().secret.expose(),
        b"alpha"
    );
}

#[test]
fn remove_after_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n");
    let source = CredentialSource::file(&format!("rm:{}", path.display()));
    assert!(matches!(
        source,
        CredentialSource::File {
            remove_after_read: true,
            ..
        }
    ));

    let store = CredentialStore::load(source).unwrap();
    assert!(!path.exists());
    assert_eq!(store.reload(true).unwrap(), ReloadOutcome::NotModified);
    assert_eq!(store.snapshot().slots().len(), 1);
}

#[test]
fn pinned_slots_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "passwd", "alpha\n__BEGIN_VIEWONLY__\nbeta\n");
    let store = CredentialStore::load(file_source(&path)).unwrap();
    store.pin(CredentialSlot::new(
        Tier::Full,
        "cookie",
        SlotSource::DisplayManagerCookie,
    ));

    let sources: Vec<SlotSource> = store.snapshot().slots().iter().map(|s| s.source).collect();
    assert_eq!(
        sources,
        [
            SlotSource::File,
            SlotSource::DisplayManagerCookie,
            SlotSource::File
        ]
    );

    write_file(&dir, "passwd", "omega\n");
    store.reload(false).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.slots().len(), 2);
    assert_eq!(snapshot.primary().unwrap().secret.expose(), b"omega");
    assert_eq!(snapshot.slots()[1].source, SlotSource::DisplayManagerCookie);
}

#[test]
fn secrets_are_not_printed() {
    let store = CredentialStore::load(CredentialSource::inline("hunter2\n")).unwrap();
    let debug = format!("{:?}", store.snapshot());
    assert!(!debug.contains("hunter2"));
}
