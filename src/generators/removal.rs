// src/generators/removal.rs
//! Host-side attempts to take a tracked token out of the world, and the answer.

use super::core::EntryFlag;

/// Why the host wants the token gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Sucked into a container (not a living entity).
    ContainerPickup,
    /// Damaged or destroyed.
    Damage,
    /// Aged out.
    AgeDespawn,
}

impl RemovalCause {
    /// Flag that, when set on the owning entry, vetoes this removal.
    pub fn guarded_by(self) -> EntryFlag {
        match self {
            RemovalCause::ContainerPickup => EntryFlag::InventoryPickup,
            RemovalCause::Damage => EntryFlag::Invulnerable,
            RemovalCause::AgeDespawn => EntryFlag::Persistent,
        }
    }
}

#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalVerdict {
    /// Go ahead; the token is no longer tracked.
    Allow,
    /// Cancel the host action; the token stays tracked.
    Veto,
}

impl RemovalVerdict {
    #[inline]
    pub fn is_veto(self) -> bool { self == RemovalVerdict::Veto }
}
