//! Command line arguments. Flags override the configuration file.

use crate::{DaemonConfig, config::Mode};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Credential-gated session admission for a remote display.
#[derive(Parser, Debug, Default)]
#[command(name = "vncgated", version, about)]
pub struct Cli {
    /// Configuration file. Defaults to the global config dir.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Protocol listen address.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Drop privileges to this account after startup (user[:group] or uid[:gid]).
    #[arg(long)]
    pub user: Option<String>,

    /// Password file. Prefix with `rm:` to delete it after reading.
    #[arg(long)]
    pub passwdfile: Option<String>,

    /// Full-control password.
    #[arg(long)]
    pub passwd: Option<String>,

    /// View-only password.
    #[arg(long)]
    pub viewpasswd: Option<String>,

    /// How to wait for peers.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Exit after the first connection closes.
    #[arg(long)]
    pub once: bool,

    /// Lurk until this file appears.
    #[arg(long)]
    pub lurk_file: Option<PathBuf>,

    /// Bootstrap HTTP listen address.
    #[arg(long)]
    pub http_listen: Option<SocketAddr>,

    /// Accept the display manager's cookie for this X display.
    #[arg(long)]
    pub display: Option<u32>,

    /// Xauthority file to read the display cookie from.
    #[arg(long)]
    pub xauthority: Option<PathBuf>,
}

impl Cli {
    /// Apply flags on top of `config`.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(listen) = self.listen {
            config.listen.addr = listen;
        }
        if let Some(user) = &self.user {
            config.privilege.user = Some(user.clone());
        }
        if let Some(path) = &self.passwdfile {
            config.auth.passwdfile = Some(path.clone());
            config.auth.passwd.clear();
            config.auth.view_passwd.clear();
        }
        if let Some(passwd) = &self.passwd {
            config.auth.passwdfile = None;
            config.auth.passwd = vec![passwd.clone()];
        }
        if let Some(passwd) = &self.viewpasswd {
            config.auth.view_passwd = vec![passwd.clone()];
        }
        if let Some(mode) = self.mode {
            config.admission.mode = mode;
        }
        if self.once {
            config.admission.once = true;
        }
        if let Some(path) = &self.lurk_file {
            config.admission.lurk_file = Some(path.clone());
            if self.mode.is_none() {
                config.admission.mode = Mode::Lurk;
            }
        }
        if let Some(addr) = self.http_listen {
            config.admission.http_listen = addr;
            if self.mode.is_none() {
                config.admission.mode = Mode::Bootstrap;
            }
        }
        if let Some(display) = self.display {
            config.cookie.display = Some(display);
        }
        if let Some(path) = &self.xauthority {
            config.cookie.xauthority = Some(path.clone());
        }
    }
}
