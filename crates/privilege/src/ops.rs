//! OS identity primitives.

use crate::Identity;
use nix::{
    errno::Errno,
    unistd::{Gid, Group, Uid, User},
};

/// The process-identity calls the manager needs.
///
/// [`System`] talks to the kernel; tests substitute a fake.
pub trait IdentityOps {
    /// Real uid and gid.
    fn real(&self) -> Identity;

    /// Effective uid and gid.
    fn effective(&self) -> Identity;

    /// Saved set-user and set-group ids.
    fn saved(&self) -> nix::Result<Identity>;

    /// Passwd entry for a user name: uid and primary gid.
    fn lookup_user(&self, name: &str) -> nix::Result<Option<(Uid, Gid)>>;

    /// Group entry for a group name.
    fn lookup_group(&self, name: &str) -> nix::Result<Option<Gid>>;

    /// Replace the supplementary group list.
    fn set_groups(&self, groups: &[Gid]) -> nix::Result<()>;

    /// Set real, effective and saved gid.
    fn set_gid(&self, gid: Gid) -> nix::Result<()>;

    /// Set real, effective and saved uid.
    fn set_uid(&self, uid: Uid) -> nix::Result<()>;
}

/// The running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl IdentityOps for System {
    fn real(&self) -> Identity {
        Identity {
            uid: nix::unistd::getuid(),
            gid: nix::unistd::getgid(),
        }
    }

    fn effective(&self) -> Identity {
        Identity {
            uid: nix::unistd::geteuid(),
            gid: nix::unistd::getegid(),
        }
    }

    fn saved(&self) -> nix::Result<Identity> {
        Ok(Identity {
            uid: nix::unistd::getresuid()?.saved,
            gid: nix::unistd::getresgid()?.saved,
        })
    }

    fn lookup_user(&self, name: &str) -> nix::Result<Option<(Uid, Gid)>> {
        Ok(User::from_name(name)?.map(|u| (u.uid, u.gid)))
    }

    fn lookup_group(&self, name: &str) -> nix::Result<Option<Gid>> {
        Ok(Group::from_name(name)?.map(|g| g.gid))
    }

    fn set_groups(&self, groups: &[Gid]) -> nix::Result<()> {
        nix::unistd::setgroups(groups)
    }

    fn set_gid(&self, gid: Gid) -> nix::Result<()> {
        // setgid as root sets all three ids.
        nix::unistd::setgid(gid)?;
        if nix::unistd::getegid() != gid {
            return Err(Errno::EPERM);
        }
        Ok(())
    }

    fn set_uid(&self, uid: Uid) -> nix::Result<()> {
        nix::unistd::setuid(uid)?;
        if nix::unistd::geteuid() != uid {
            return Err(Errno::EPERM);
        }
        Ok(())
    }
}
