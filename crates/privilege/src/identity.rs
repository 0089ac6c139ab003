//! User/group identities and their textual form.

use crate::{IdentityOps, PrivilegeError};
use nix::unistd::{Gid, Uid};
use std::fmt;

/// A user and group pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
}

impl Identity {
    /// Identity from raw ids.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(gid),
        }
    }

    /// Whether this is the superuser.
    pub fn is_root(&self) -> bool {
        self.uid.is_root()
    }

    /// Resolve `user`, `user:group`, `uid` or `uid:gid`.
    ///
    /// A user without a group takes the user's primary group. A numeric
    /// uid with no passwd entry and no group is an error, since there is no
    /// primary group to fall back on.
    pub fn resolve<O: IdentityOps + ?Sized>(target: &str, ops: &O) -> Result<Self, PrivilegeError> {
        let (user, group) = match target.split_once(':') {
            Some((user, group)) => (user, Some(group)),
            None => (target, None),
        };
        if user.is_empty() {
            return Err(PrivilegeError::UnknownIdentity {
                name: target.to_owned(),
            });
        }

        let entry = ops.lookup_user(user).map_err(|source| PrivilegeError::Lookup {
            name: user.to_owned(),
            source,
        })?;
        let (uid, primary) = match (entry, user.parse::<u32>()) {
            (Some((uid, gid)), _) => (uid, Some(gid)),
            (None, Ok(raw)) => (Uid::from_raw(raw), None),
            (None, Err(_)) => {
                return Err(PrivilegeError::UnknownIdentity {
                    name: user.to_owned(),
                });
            }
        };

        let gid = match group {
            Some(group) => resolve_group(group, ops)?,
            None => primary.ok_or_else(|| PrivilegeError::UnknownIdentity {
                name: target.to_owned(),
            })?,
        };
        Ok(Self { uid, gid })
    }
}

fn resolve_group<O: IdentityOps + ?Sized>(group: &str, ops: &O) -> Result<Gid, PrivilegeError> {
    let entry = ops.lookup_group(group).map_err(|source| PrivilegeError::Lookup {
        name: group.to_owned(),
        source,
    })?;
    match (entry, group.parse::<u32>()) {
        (Some(gid), _) => Ok(gid),
        (None, Ok(raw)) => Ok(Gid::from_raw(raw)),
        (None, Err(_)) => Err(PrivilegeError::UnknownIdentity {
            name: group.to_owned(),
        }),
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}
