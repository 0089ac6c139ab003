//! Daemon configuration tests.

use clap::Parser;
use std::net::SocketAddr;
use vncgated::{Cli, DaemonConfig, config::Mode};

#[test]
fn empty_config_uses_defaults() {
    let config = DaemonConfig::from_toml("").unwrap();
    assert_eq!(config.listen.addr, "0.0.0.0:5900".parse::<SocketAddr>().unwrap());
    assert_eq!(config.admission.mode, Mode::Accept);
    assert!(!config.admission.once);
    assert_eq!(config.admission.max_failures, 5);
    assert!(config.privilege.strict);
    assert!(config.privilege.user.is_none());
    assert!(config.auth.passwdfile.is_none());
    assert!(config.auth.passwd.is_empty());
    assert_eq!(config.auth.handshake_timeout_secs, 30);
}

#[test]
fn parse_full_config() {
    let toml = r#"
[listen]
addr = "127.0.0.1:5901"

[auth]
passwdfile = "rm:/etc/vncgate/passwd"
handshake_timeout_secs = 10

[privilege]
user = "nobody:nogroup"
strict = false

[admission]
mode = "lurk"
once = true
lurk_file = "/run/vncgate/wake"
lurk_poll_ms = 100
max_failures = 3
failure_backoff_ms = 500

[cookie]
display = 0
xauthority = "/var/run/lightdm/root/:0"
"#;
    let config = DaemonConfig::from_toml(toml).unwrap();
    assert_eq!(config.listen.addr.port(), 5901);
    assert_eq!(config.auth.passwdfile.as_deref(), Some("rm:/etc/vncgate/passwd"));
    assert_eq!(config.auth.handshake_timeout().as_secs(), 10);
    assert_eq!(config.privilege.user.as_deref(), Some("nobody:nogroup"));
    assert!(!config.privilege.strict);
    assert_eq!(config.admission.mode, Mode::Lurk);
    assert!(config.admission.once);
    assert_eq!(config.admission.max_failures, 3);
    assert_eq!(config.cookie.display, Some(0));
}

#[test]
fn inline_passwords_expand_env() {
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var("VNCGATED_CONFIG_TEST_PASSWD", "s3cret") };
    let toml = r#"
[auth]
passwd = ["${VNCGATED_CONFIG_TEST_PASSWD}"]
view_passwd = ["look"]
"#;
    let config = DaemonConfig::from_toml(toml).unwrap();
    assert_eq!(config.auth.passwd, ["s3cret"]);
    assert_eq!(config.auth.view_passwd, ["look"]);
}

#[test]
fn unknown_mode_is_rejected() {
    assert!(DaemonConfig::from_toml("[admission]\nmode = \"reverse\"\n").is_err());
}

#[test]
fn flags_override_file() {
    let mut config = DaemonConfig::from_toml(
        r#"
[auth]
passwdfile = "/etc/vncgate/passwd"
"#,
    )
    .unwrap();
    let cli = Cli::parse_from([
        "vncgated",
        "--passwd",
        "alpha",
        "--viewpasswd",
        "beta",
        "--lurk-file",
        "/tmp/wake",
        "--once",
        "--user",
        "65534",
    ]);
    cli.apply(&mut config);

    assert!(config.auth.passwdfile.is_none());
    assert_eq!(config.auth.passwd, ["alpha"]);
    assert_eq!(config.auth.view_passwd, ["beta"]);
    assert_eq!(config.admission.mode, Mode::Lurk);
    assert!(config.admission.once);
    assert_eq!(config.privilege.user.as_deref(), Some("65534"));
}

#[test]
fn explicit_mode_wins_over_implied() {
    let mut config = DaemonConfig::default();
    let cli = Cli::parse_from([
        "vncgated",
        "--mode",
        "accept",
        "--http-listen",
        "127.0.0.1:5800",
    ]);
    cli.apply(&mut config);
    assert_eq!(config.admission.mode, Mode::Accept);
    assert_eq!(config.admission.http_listen.port(), 5800);

    let mut config = DaemonConfig::default();
    Cli::parse_from(["vncgated", "--http-listen", "127.0.0.1:5800"]).apply(&mut config);
    assert_eq!(config.admission.mode, Mode::Bootstrap);
}

#[test]
fn load_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vncgate.toml");
    std::fs::write(&path, "[listen\n").unwrap();
    let err = DaemonConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("vncgate.toml"));
}
