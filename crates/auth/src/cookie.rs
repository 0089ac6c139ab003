//! Display-manager cookie bridge.
//!
//! When the served display belongs to a login manager, the manager's
//! `MIT-MAGIC-COOKIE-1` for that display is pinned into the credential
//! store as an extra full-control slot.

use crate::{CredentialSlot, CredentialStore, Secret, SlotSource, Tier};
use std::path::PathBuf;
use thiserror::Error;

/// The only auth protocol the bridge understands.
pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

/// Cookie lookup failure. Never fatal to the server.
#[derive(Debug, Error)]
pub enum CookieError {
    /// No cookie could be located for the display.
    #[error("no display-manager cookie for display :{display}")]
    Unavailable { display: u32 },
    /// An Xauthority file was found but could not be parsed.
    #[error("malformed Xauthority file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: &'static str },
}

/// One record of an Xauthority file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XauthEntry {
    pub family: u16,
    pub address: Vec<u8>,
    /// Display number as text; empty matches any display.
    pub number: String,
    pub name: String,
    pub data: Vec<u8>,
}

impl XauthEntry {
    fn serves(&self, display: u32) -> bool {
        self.name == MIT_MAGIC_COOKIE
            && (self.number.is_empty() || self.number == display.to_string())
    }
}

/// Parse Xauthority records: big-endian `u16` family followed by four
/// `u16`-length-prefixed fields (address, number, name, data).
pub fn parse_xauthority(mut bytes: &[u8]) -> Result<Vec<XauthEntry>, &'static str> {
    let mut entries = Vec::new();
    while !bytes.is_empty() {
        let family = take_u16(&mut bytes)?;
        let address = take_field(&mut bytes)?.to_vec();
        let number = String::from_utf8_lossy(take_field(&mut bytes)?).into_owned();
        let name = String::from_utf8_lossy(take_field(&mut bytes)?).into_owned();
        let data = take_field(&mut bytes)?.to_vec();
        entries.push(XauthEntry {
            family,
            address,
            number,
            name,
            data,
        });
    }
    Ok(entries)
}

fn take_u16(bytes: &mut &[u8]) -> Result<u16, &'static str> {
    let Some((head, rest)) = bytes.split_first_chunk::<2>() else {
        return Err("truncated record header");
    };
    *bytes = rest;
    Ok(u16::from_be_bytes(*head))
}

fn take_field<'a>(bytes: &mut &'a [u8]) -> Result<&'a [u8], &'static str> {
    let len = take_u16(bytes)? as usize;
    if bytes.len() < len {
        return Err("truncated record field");
    }
    let (field, rest) = bytes.split_at(len);
    *bytes = rest;
    Ok(field)
}

/// Locates the display manager's session cookie for a display.
pub trait CookieLocator {
    /// Return the cookie for display `:display`.
    fn locate(&self, display: u32) -> Result<Secret, CookieError>;
}

/// Searches Xauthority files for a display's cookie.
#[derive(Debug, Clone)]
pub struct XauthLocator {
    files: Vec<PathBuf>,
    /// Directories scanned for entries starting with the given prefix; the
    /// optional leaf is joined to each match.
    scans: Vec<(PathBuf, &'static str, Option<&'static str>)>,
}

impl XauthLocator {
    /// Look only in `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            files: vec![path.into()],
            scans: Vec::new(),
        }
    }

    /// Look in each of `paths`, in order.
    pub fn files<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            files: paths.into_iter().map(Into::into).collect(),
            scans: Vec::new(),
        }
    }

    /// Well-known lightdm, gdm and xdm cookie locations for `display`.
    pub fn display_managers(display: u32) -> Self {
        Self {
            files: vec![
                PathBuf::from(format!("/var/run/lightdm/root/:{display}")),
                PathBuf::from(format!("/var/lib/gdm/:{display}.Xauth")),
            ],
            scans: vec![
                (PathBuf::from("/var/run/gdm"), "auth-for-gdm", Some("database")),
                (PathBuf::from("/var/lib/xdm/authdir/authfiles"), "", None),
            ],
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut out = self.files.clone();
        for (dir, prefix, leaf) in &self.scans {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
                .map(|e| match leaf {
                    Some(leaf) => e.path().join(leaf),
                    None => e.path(),
                })
                .collect();
            found.sort();
            out.extend(found);
        }
        out
    }
}

impl CookieLocator for XauthLocator {
    fn locate(&self, display: u32) -> Result<Secret, CookieError> {
        for path in self.candidates() {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let entries = match parse_xauthority(&bytes) {
                Ok(entries) => entries,
                Err(reason) => {
                    tracing::warn!("{}", CookieError::Malformed { path, reason });
                    continue;
                }
            };
            if let Some(entry) = entries.iter().find(|e| e.serves(display)) {
                tracing::debug!("found display cookie in {}", path.display());
                return Ok(Secret::new(entry.data.clone()));
            }
        }
        Err(CookieError::Unavailable { display })
    }
}

/// Look up the display manager's cookie for display `display_num` and wrap
/// it as a full-control slot, ready to be pinned.
pub fn display_cookie_slot<L: CookieLocator + ?Sized>(
    locator: &L,
    display_num: u32,
) -> Result<CredentialSlot, CookieError> {
    let secret = locator.locate(display_num)?;
    Ok(CredentialSlot::new(
        Tier::Full,
        secret,
        SlotSource::DisplayManagerCookie,
    ))
}

/// Pin the display manager's cookie for `display_num` into `store` as a
/// full-control slot.
pub fn bridge_display_cookie<L: CookieLocator + ?Sized>(
    store: &CredentialStore,
    locator: &L,
    display_num: u32,
) -> Result<(), CookieError> {
    let generation = store.pin(display_cookie_slot(locator, display_num)?);
    tracing::info!("installed display-manager cookie for :{display_num} (generation {generation})");
    Ok(())
}
