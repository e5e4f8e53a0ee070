//! Stable identities for modules and their members.
//!
//! Metadata tokens repeat across modules, so every analysis record is keyed by a
//! [`MemberId`]: the declaring module's version id plus the member's token. Two lookups
//! for the same underlying callable always produce equal `MemberId`s, which is what makes
//! the analysis cache hand back the same entry for both.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uguid::Guid;

use crate::metadata::token::Token;

/// Identity of one loaded module, its module version id (MVID).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub Guid);

impl ModuleId {
    /// Wraps an MVID read from the module's `Module` table.
    #[must_use]
    pub const fn new(mvid: Guid) -> Self {
        ModuleId(mvid)
    }

    /// Derives a deterministic MVID from a module name.
    ///
    /// Used for program images that do not carry a real MVID, so that the same name
    /// always maps to the same identity.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let digest = Sha1::digest(name.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        ModuleId(Guid::from_bytes(bytes))
    }

    /// The underlying MVID.
    #[must_use]
    pub const fn mvid(&self) -> Guid {
        self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide identity of a method, type or field: declaring module + metadata token.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId {
    /// The module declaring the member.
    pub module: ModuleId,
    /// The member's token inside that module.
    pub token: Token,
}

/// Identity of a method entry in the analysis cache.
pub type MethodId = MemberId;
/// Identity of a class entry in the analysis cache.
pub type ClassId = MemberId;

impl MemberId {
    /// Creates a member identity.
    #[must_use]
    pub const fn new(module: ModuleId, token: Token) -> Self {
        MemberId { module, token }
    }

    /// A stable 64-bit hash of `(module, token)`.
    ///
    /// Unlike [`std::hash::Hash`], the value does not depend on the hasher or the process
    /// and can be persisted or shown to users.
    #[must_use]
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = Sha1::new();
        hasher.update(self.module.0.to_bytes());
        hasher.update(self.token.value().to_le_bytes());
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberId({}@{})", self.token, self.module.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token, self.module.0)
    }
}
