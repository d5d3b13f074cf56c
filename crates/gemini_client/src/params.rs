use std::path::PathBuf;

use crate::mask::TrustMask;

/// Host-supplied policy: what the TLS recovery ladder may do, and where
/// accepted capsule fingerprints are pinned.
///
/// Mirrors `NewControl(ctx, isv)` from the original: the caller passes the
/// trust mask once at construction and the dialer consults it on every
/// recoverable TLS failure.
pub trait Params {
    /// The trust mask governing the recovery ladder (§4.4).
    fn isv(&self) -> TrustMask;

    /// Path to the known-capsules store (§4.3), in `known_hosts` format.
    fn known_hosts(&self) -> PathBuf;
}

/// A `Params` built from plain values, for hosts that don't need a custom
/// implementation.
#[derive(Debug, Clone)]
pub struct StaticParams {
    isv: TrustMask,
    known_hosts: PathBuf,
}

impl StaticParams {
    pub fn new(isv: TrustMask, known_hosts: impl Into<PathBuf>) -> Self {
        Self {
            isv,
            known_hosts: known_hosts.into(),
        }
    }
}

impl Params for StaticParams {
    fn isv(&self) -> TrustMask {
        self.isv
    }

    fn known_hosts(&self) -> PathBuf {
        self.known_hosts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_params_round_trips_fields() {
        let p = StaticParams::new(TrustMask::ACCEPT_UAE, "/tmp/known_hosts");
        assert!(p.isv().has(TrustMask::ACCEPT_UAE));
        assert_eq!(p.known_hosts(), PathBuf::from("/tmp/known_hosts"));
    }
}
