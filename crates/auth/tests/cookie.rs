//! Display-manager cookie bridge tests.

use vncgate_auth::{
    CookieError, CookieLocator, CredentialSource, CredentialStore, SlotSource, Tier, XauthLocator,
    bridge_display_cookie, cookie::parse_xauthority, display_cookie_slot,
};

fn record(family: u16, number: &str, name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = family.to_be_bytes().to_vec();
    for field in [&b"host"[..], number.as_bytes(), name.as_bytes(), data] {
        out.extend_from_slice(&(field.len() as u16).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

#[test]
fn parses_records() {
    let mut bytes = record(256, "0", "MIT-MAGIC-COOKIE-1", &[1, 2, 3]);
    bytes.extend(record(0, "1", "XDM-AUTHORIZATION-1", &[9]));
    let entries = parse_xauthority(&bytes).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].family, 256);
    assert_eq!(entries[0].address, b"host");
    assert_eq!(entries[0].number, "0");
    assert_eq!(entries[0].data, [1, 2, 3]);
    assert_eq!(entries[1].name, "XDM-AUTHORIZATION-1");
}

#[test]
fn truncated_record_is_rejected() {
    let bytes = record(256, "0", "MIT-MAGIC-COOKIE-1", &[1, 2, 3]);
    assert!(parse_xauthority(&bytes[..bytes.len() - 1]).is_err());
    assert!(parse_xauthority(&[0x01]).is_err());
}

#[test]
fn locates_cookie_for_display() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(":1");
    let mut bytes = record(256, "0", "MIT-MAGIC-COOKIE-1", b"zero");
    bytes.extend(record(256, "1", "XDM-AUTHORIZATION-1", b"other"));
    bytes.extend(record(256, "1", "MIT-MAGIC-COOKIE-1", b"one"));
    std::fs::write(&path, bytes).unwrap();

    let locator = XauthLocator::file(&path);
    assert_eq!(locator.locate(1).unwrap().expose(), b"one");
    assert_eq!(locator.locate(0).unwrap().expose(), b"zero");
    assert!(matches!(
        locator.locate(7),
        Err(CookieError::Unavailable { display: 7 })
    ));
}

#[test]
fn empty_number_matches_any_display() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xauth");
    std::fs::write(&path, record(256, "", "MIT-MAGIC-COOKIE-1", b"any")).unwrap();
    assert_eq!(
        XauthLocator::file(&path).locate(3).unwrap().expose(),
        b"any"
    );
}

#[test]
fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let locator = XauthLocator::file(dir.path().join("absent"));
    assert!(matches!(
        locator.locate(0),
        Err(CookieError::Unavailable { display: 0 })
    ));
}

#[test]
fn malformed_candidate_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("gdm");
    let good = dir.path().join("xdm");
    std::fs::write(&broken, [0x01]).unwrap();
    std::fs::write(&good, record(256, "2", "MIT-MAGIC-COOKIE-1", b"two")).unwrap();

    let locator = XauthLocator::files([&broken, &good]);
    assert_eq!(locator.locate(2).unwrap().expose(), b"two");

    let locator = XauthLocator::files([&broken]);
    assert!(matches!(
        locator.locate(2),
        Err(CookieError::Unavailable { display: 2 })
    ));
}

#[test]
fn cookie_slot_is_full_tier() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(":4");
    std::fs::write(&path, record(256, "4", "MIT-MAGIC-COOKIE-1", b"four")).unwrap();

    let slot = display_cookie_slot(&XauthLocator::file(&path), 4).unwrap();
    assert_eq!(slot.tier, Tier::Full);
    assert_eq!(slot.source, SlotSource::DisplayManagerCookie);
    assert_eq!(slot.secret.expose(), b"four");
}

#[test]
fn bridge_pins_full_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(":0");
    std::fs::write(&path, record(256, "0", "MIT-MAGIC-COOKIE-1", b"cookie")).unwrap();

    let store = CredentialStore::load(CredentialSource::inline("alpha\n")).unwrap();
    bridge_display_cookie(&store, &XauthLocator::file(&path), 0).unwrap();

    let snapshot = store.snapshot();
    let cookie = snapshot
        .slots()
        .iter()
        .find(|s| s.source == SlotSource::DisplayManagerCookie)
        .unwrap();
    assert_eq!(cookie.tier, Tier::Full);
    assert_eq!(cookie.secret.expose(), b"cookie");
    assert_eq!(snapshot.primary().unwrap().secret.expose(), b"alpha");
}

#[test]
fn unavailable_cookie_leaves_store_untouched() {
    let store = CredentialStore::disabled();
    let dir = tempfile::tempdir().unwrap();
    let err = bridge_display_cookie(&store, &XauthLocator::file(dir.path().join("x")), 0)
        .unwrap_err();
    assert!(matches!(err, CookieError::Unavailable { .. }));
    assert!(store.snapshot().is_disabled());
}
