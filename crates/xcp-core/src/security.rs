//! Seed/key security access.
//!
//! Each protected resource (CAL/PAG, DAQ, STIM, PGM) is unlocked
//! independently: GET_SEED issues a challenge for one resource and a
//! matching UNLOCK grants that resource only.
//!
//! The key derivation in [`compute_key`] is an XOR/rotate obfuscation kept
//! for compatibility with existing key calculator DLLs. It is not a MAC and
//! offers no protection against an attacker who has seen one seed/key pair.

use std::fmt;

use bitflags::bitflags;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::protocol::constants::*;

bitflags! {
    /// Resource mask as carried in CONNECT and GET_STATUS.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceMask: u8 {
        const CAL_PAG = RESOURCE_CAL_PAG;
        const DAQ     = RESOURCE_DAQ;
        const STIM    = RESOURCE_STIM;
        const PGM     = RESOURCE_PGM;
    }
}

/// A protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    CalPag,
    Daq,
    Stim,
    Pgm,
}

impl Resource {
    pub const ALL: [Resource; 4] = [Resource::CalPag, Resource::Daq, Resource::Stim, Resource::Pgm];

    /// GET_SEED mode byte: 0 CAL/PAG, 1 DAQ, 2 STIM, 3 PGM.
    pub fn from_seed_mode(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Resource::CalPag),
            1 => Some(Resource::Daq),
            2 => Some(Resource::Stim),
            3 => Some(Resource::Pgm),
            _ => None,
        }
    }

    pub fn mask(self) -> ResourceMask {
        match self {
            Resource::CalPag => ResourceMask::CAL_PAG,
            Resource::Daq => ResourceMask::DAQ,
            Resource::Stim => ResourceMask::STIM,
            Resource::Pgm => ResourceMask::PGM,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::CalPag => write!(f, "CAL_PAG"),
            Resource::Daq => write!(f, "DAQ"),
            Resource::Stim => write!(f, "STIM"),
            Resource::Pgm => write!(f, "PGM"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityStatus {
    #[default]
    Locked,
    SeedRequested,
    Unlocked,
}

/// Security settings, usually the `[security]` section of the slave config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Master switch. When off every resource is accessible.
    pub enabled: bool,
    pub protect_cal: bool,
    pub protect_daq: bool,
    pub protect_stim: bool,
    pub protect_pgm: bool,
    /// Secret shared with the tool's key calculator.
    pub secret_key: u32,
    /// Fixed PRNG seed for reproducible challenges. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protect_cal: true,
            protect_daq: false,
            protect_stim: false,
            protect_pgm: true,
            secret_key: 0x1234_5678,
            rng_seed: None,
        }
    }
}

impl SecurityConfig {
    /// Resources that require an unlock while security is enabled.
    pub fn protected(&self) -> ResourceMask {
        let mut mask = ResourceMask::empty();
        mask.set(ResourceMask::CAL_PAG, self.protect_cal);
        mask.set(ResourceMask::DAQ, self.protect_daq);
        mask.set(ResourceMask::STIM, self.protect_stim);
        mask.set(ResourceMask::PGM, self.protect_pgm);
        mask
    }
}

/// Per-resource lock state plus the outstanding challenge.
pub struct Security {
    config: SecurityConfig,
    status: [SecurityStatus; 4],
    pending: Option<(Resource, [u8; SEED_LENGTH])>,
    rng: StdRng,
}

impl Security {
    pub fn new(config: SecurityConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            status: [SecurityStatus::Locked; 4],
            pending: None,
            rng,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Re-lock everything and drop any outstanding seed.
    pub fn reset(&mut self) {
        self.status = [SecurityStatus::Locked; 4];
        self.pending = None;
    }

    pub fn status(&self, resource: Resource) -> SecurityStatus {
        self.status[resource.index()]
    }

    /// Whether commands touching `resource` may run.
    pub fn is_unlocked(&self, resource: Resource) -> bool {
        if !self.config.enabled || !self.config.protected().contains(resource.mask()) {
            return true;
        }
        self.status(resource) == SecurityStatus::Unlocked
    }

    /// Resources that are protected and still locked (GET_STATUS byte).
    pub fn protection(&self) -> ResourceMask {
        Resource::ALL
            .iter()
            .filter(|r| !self.is_unlocked(**r))
            .fold(ResourceMask::empty(), |mask, r| mask | r.mask())
    }

    /// Resource addressed by the outstanding seed, if any.
    pub fn pending_resource(&self) -> Option<Resource> {
        self.pending.map(|(r, _)| r)
    }

    /// Issue a challenge for `resource`.
    ///
    /// Returns an empty seed when the resource is already unlocked. A new
    /// request replaces any earlier outstanding seed.
    pub fn get_seed(&mut self, resource: Resource) -> Vec<u8> {
        if self.status(resource) == SecurityStatus::Unlocked {
            debug!(resource = %resource, "Resource already unlocked");
            return Vec::new();
        }

        if let Some((prev, _)) = self.pending.take()
            && self.status[prev.index()] == SecurityStatus::SeedRequested
        {
            self.status[prev.index()] = SecurityStatus::Locked;
        }

        let seed = self.generate_seed();
        self.pending = Some((resource, seed));
        self.status[resource.index()] = SecurityStatus::SeedRequested;
        debug!(resource = %resource, "Seed issued");
        seed.to_vec()
    }

    /// Check `key` against the outstanding seed.
    ///
    /// On failure nothing changes and the seed stays valid for a retry.
    pub fn unlock(&mut self, key: &[u8]) -> bool {
        let Some((resource, seed)) = self.pending else {
            warn!("UNLOCK without outstanding seed");
            return false;
        };
        if key.len() != KEY_LENGTH {
            warn!(resource = %resource, len = key.len(), "UNLOCK with wrong key length");
            return false;
        }
        if compute_key(&seed, self.config.secret_key) != key {
            warn!(resource = %resource, "UNLOCK with wrong key");
            return false;
        }

        self.status[resource.index()] = SecurityStatus::Unlocked;
        self.pending = None;
        info!(resource = %resource, "Resource unlocked");
        true
    }

    fn generate_seed(&mut self) -> [u8; SEED_LENGTH] {
        let mut seed = [0u8; SEED_LENGTH];
        self.rng.fill_bytes(&mut seed);
        for (i, b) in seed.iter_mut().enumerate() {
            *b ^= (self.config.secret_key >> (i * 8)) as u8;
        }
        seed
    }
}

/// Derive the key for `seed` under `secret`.
///
/// Seed bytes are folded little-endian into a word, mixed with the secret
/// and two rotations, and the result is sent big-endian.
pub fn compute_key(seed: &[u8], secret: u32) -> [u8; KEY_LENGTH] {
    let mut temp = seed
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc ^ ((b as u32) << ((i % 4) * 8)));
    temp ^= secret;
    temp = temp.rotate_left(13) ^ 0xDEAD_BEEF;
    temp = temp.rotate_left(7) ^ secret;
    temp.to_be_bytes()
}
