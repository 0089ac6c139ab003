//! The credential store.
//!
//! Readers take an [`Arc<Snapshot>`] under a read lock held only for the
//! pointer clone. Writers parse outside any lock, then swap the pointer, so
//! a reader sees either the whole old slot sequence or the whole new one.
//! Writers are serialised by a separate mutex.

use crate::{CredentialError, CredentialGate, CredentialSlot, SlotSource, Tier, passwd};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

/// Prefix marking a password file to delete after the first read.
pub const REMOVE_PREFIX: &str = "rm:";

/// Where the password list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A password file, re-read on reload.
    File {
        path: PathBuf,
        /// Delete the file after the initial read. Such a source is never
        /// reloaded.
        remove_after_read: bool,
    },
    /// An inline password list in the password file grammar.
    Inline(String),
}

impl CredentialSource {
    /// A password file source, honouring the `rm:` prefix.
    pub fn file(arg: &str) -> Self {
        match arg.strip_prefix(REMOVE_PREFIX) {
            Some(path) => Self::File {
                path: PathBuf::from(path),
                remove_after_read: true,
            },
            None => Self::File {
                path: PathBuf::from(arg),
                remove_after_read: false,
            },
        }
    }

    /// An inline source.
    pub fn inline(text: impl Into<String>) -> Self {
        Self::Inline(text.into())
    }

    fn reloadable_path(&self) -> Option<&Path> {
        match self {
            Self::File {
                path,
                remove_after_read: false,
            } => Some(path),
            _ => None,
        }
    }
}

/// Identity of a password file's contents at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
    digest: [u8; 32],
}

impl Fingerprint {
    fn of(bytes: &[u8], modified: Option<SystemTime>) -> Self {
        Self {
            len: bytes.len() as u64,
            modified,
            digest: Sha256::digest(bytes).into(),
        }
    }

    /// Length and mtime on disk still match, so the file need not be read.
    fn matches_metadata(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        self.modified.is_some() && meta.len() == self.len && meta.modified().ok() == self.modified
    }
}

/// An immutable view of the installed credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    slots: Arc<[CredentialSlot]>,
    generation: u64,
    loaded_at: SystemTime,
}

impl Snapshot {
    fn new(slots: Vec<CredentialSlot>, generation: u64) -> Self {
        Self {
            slots: slots.into(),
            generation,
            loaded_at: SystemTime::now(),
        }
    }

    /// Slots in match order: full before view-only.
    pub fn slots(&self) -> &[CredentialSlot] {
        &self.slots
    }

    /// No slots: authentication is disabled.
    pub fn is_disabled(&self) -> bool {
        self.slots.is_empty()
    }

    /// The primary full-control slot.
    pub fn primary(&self) -> Option<&CredentialSlot> {
        self.slots.iter().find(|s| s.tier == Tier::Full)
    }

    /// Number of slots granting `tier`.
    pub fn count(&self, tier: Tier) -> usize {
        self.slots.iter().filter(|s| s.tier == tier).count()
    }

    /// Bumped on every successful load, reload, or pin.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this snapshot was published.
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

/// Result of a successful [`CredentialStore::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The source is unchanged, or not reloadable.
    NotModified,
    /// A new slot sequence was installed.
    Reloaded { generation: u64 },
}

#[derive(Debug, Default)]
struct Writer {
    fingerprint: Option<Fingerprint>,
    /// Slots from sources other than the password list, kept across reloads.
    pinned: Vec<CredentialSlot>,
    /// Slots parsed from the password list.
    parsed: Vec<CredentialSlot>,
}

/// Shared, hot-reloadable credential store.
#[derive(Debug)]
pub struct CredentialStore {
    source: Option<CredentialSource>,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<Writer>,
}

impl CredentialStore {
    /// A store with no slots. Every handshake is accepted at full tier.
    pub fn disabled() -> Self {
        Self {
            source: None,
            current: RwLock::new(Arc::new(Snapshot::new(Vec::new(), 0))),
            writer: Mutex::new(Writer::default()),
        }
    }

    /// Load a password list.
    pub fn load(source: CredentialSource) -> Result<Self, CredentialError> {
        let (parsed, fingerprint) = read_source(&source)?;

        if let CredentialSource::File {
            path,
            remove_after_read: true,
        } = &source
        {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("removed password file {}", path.display()),
                Err(e) => tracing::warn!("could not remove password file {}: {e}", path.display()),
            }
        }

        let snapshot = Snapshot::new(parsed.clone(), 1);
        tracing::info!(
            "loaded {} full and {} view-only password(s)",
            snapshot.count(Tier::Full),
            snapshot.count(Tier::ViewOnly)
        );
        Ok(Self {
            source: Some(source),
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(Writer {
                fingerprint,
                pinned: Vec::new(),
                parsed,
            }),
        })
    }

    /// The source this store was loaded from, if any.
    pub fn source(&self) -> Option<&CredentialSource> {
        self.source.as_ref()
    }

    /// The current slot sequence.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Re-read the source.
    ///
    /// Without `force`, an unchanged file is reported as
    /// [`ReloadOutcome::NotModified`]; matching length and mtime skip the
    /// read entirely. On failure the installed slots stay
    /// as they were and [`CredentialError::ReloadFailed`] is returned.
    pub fn reload(&self, force: bool) -> Result<ReloadOutcome, CredentialError> {
        let Some(path) = self.source.as_ref().and_then(CredentialSource::reloadable_path) else {
            return Ok(ReloadOutcome::NotModified);
        };

        let mut writer = self.writer.lock();
        if !force
            && writer
                .fingerprint
                .as_ref()
                .is_some_and(|f| f.matches_metadata(path))
        {
            return Ok(ReloadOutcome::NotModified);
        }
        let (bytes, modified) = read_file(path).map_err(|e| reload_failed(path, e))?;
        let fingerprint = Fingerprint::of(&bytes, modified);
        if !force && writer.fingerprint.as_ref() == Some(&fingerprint) {
            return Ok(ReloadOutcome::NotModified);
        }

        let parsed = passwd::parse(&bytes, SlotSource::File).map_err(|e| reload_failed(path, e))?;
        writer.parsed = parsed;
        writer.fingerprint = Some(fingerprint);
        let generation = self.publish(&writer);
        tracing::info!(
            "reloaded password file {} (generation {generation})",
            path.display()
        );
        Ok(ReloadOutcome::Reloaded { generation })
    }

    /// Add a slot that is not part of the password list. Pinned slots
    /// survive reloads.
    pub fn pin(&self, slot: CredentialSlot) -> u64 {
        let mut writer = self.writer.lock();
        writer.pinned.push(slot);
        self.publish(&writer)
    }

    /// Publish this store to the protocol layer as an authenticator.
    pub fn install(self: &Arc<Self>) -> CredentialGate {
        let snapshot = self.snapshot();
        if snapshot.is_disabled() {
            tracing::warn!("no passwords installed, authentication is disabled");
        } else {
            tracing::info!(
                "installed {} password slot(s) (generation {})",
                snapshot.slots().len(),
                snapshot.generation()
            );
        }
        CredentialGate::new(Arc::clone(self))
    }

    /// Merge parsed and pinned slots and swap them in. Caller holds the
    /// writer lock.
    fn publish(&self, writer: &Writer) -> u64 {
        let mut slots: Vec<CredentialSlot> =
            writer.parsed.iter().chain(&writer.pinned).cloned().collect();
        // Stable: listed slots stay ahead of pinned slots within a tier.
        slots.sort_by_key(|s| s.tier);

        let generation = self.current.read().generation + 1;
        let snapshot = Arc::new(Snapshot::new(slots, generation));
        *self.current.write() = snapshot;
        generation
    }
}

fn read_source(
    source: &CredentialSource,
) -> Result<(Vec<CredentialSlot>, Option<Fingerprint>), CredentialError> {
    match source {
        CredentialSource::File {
            path,
            remove_after_read,
        } => {
            let (bytes, modified) = read_file(path)?;
            let slots = passwd::parse(&bytes, SlotSource::File)?;
            let fingerprint = (!remove_after_read).then(|| Fingerprint::of(&bytes, modified));
            Ok((slots, fingerprint))
        }
        CredentialSource::Inline(text) => {
            Ok((passwd::parse(text.as_bytes(), SlotSource::Inline)?, None))
        }
    }
}

fn read_file(path: &Path) -> Result<(Vec<u8>, Option<SystemTime>), CredentialError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CredentialError::MissingFile {
            path: path.to_owned(),
        },
        _ => CredentialError::UnreadableFile {
            path: path.to_owned(),
            source,
        },
    })?;
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok((bytes, modified))
}

fn reload_failed(path: &Path, source: CredentialError) -> CredentialError {
    CredentialError::ReloadFailed {
        path: path.to_owned(),
        source: Box::new(source),
    }
}
