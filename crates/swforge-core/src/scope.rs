//! Audience scopes for registered service worker scripts
//!
//! A scope partitions the site into the public front end and the
//! administrative area. Registered scripts carry a scope bitmask; a serve
//! request carries exactly one audience, and a script is included when the
//! two masks intersect.

use serde::{Deserialize, Serialize};

/// Audience scope bitmask.
///
/// `FRONT` and `ADMIN` are the two requestable audiences; `ALL` is their
/// union and is only valid as a stored registration scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope(u8);

impl Scope {
    /// Public site audience.
    pub const FRONT: Scope = Scope(1);
    /// Administrative area audience.
    pub const ADMIN: Scope = Scope(2);
    /// Both audiences.
    pub const ALL: Scope = Scope(3);

    /// Raw bitmask value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Interpret a raw bitmask, returning `None` for values outside
    /// {FRONT, ADMIN, ALL}.
    pub fn from_bits(bits: u8) -> Option<Scope> {
        match bits {
            1 => Some(Scope::FRONT),
            2 => Some(Scope::ADMIN),
            3 => Some(Scope::ALL),
            _ => None,
        }
    }

    /// Interpret a raw bitmask, correcting invalid values to `ALL`.
    ///
    /// An out-of-range scope is developer misuse, not a fatal condition:
    /// the registration still succeeds, with a warning.
    pub fn from_bits_lossy(bits: u8) -> Scope {
        match Scope::from_bits(bits) {
            Some(scope) => scope,
            None => {
                tracing::warn!(bits, "invalid registration scope, defaulting to ALL");
                Scope::ALL
            }
        }
    }

    /// Whether two scope masks share at least one audience.
    pub fn intersects(self, other: Scope) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether this scope names exactly one audience and can therefore be
    /// requested from the serving endpoint.
    pub fn is_requestable(self) -> bool {
        self == Scope::FRONT || self == Scope::ADMIN
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_table() {
        assert!(Scope::ALL.intersects(Scope::FRONT));
        assert!(Scope::ALL.intersects(Scope::ADMIN));
        assert!(!Scope::FRONT.intersects(Scope::ADMIN));
        assert!(Scope::FRONT.intersects(Scope::FRONT));
        assert!(Scope::ADMIN.intersects(Scope::ADMIN));
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(Scope::from_bits(1), Some(Scope::FRONT));
        assert_eq!(Scope::from_bits(2), Some(Scope::ADMIN));
        assert_eq!(Scope::from_bits(3), Some(Scope::ALL));
        assert_eq!(Scope::from_bits(0), None);
        assert_eq!(Scope::from_bits(7), None);
    }

    #[test]
    fn test_invalid_bits_default_to_all() {
        // Surface the correction warning when running with --nocapture.
        let _ = tracing_subscriber::fmt()
            .with_env_filter("swforge_core=warn")
            .with_test_writer()
            .try_init();

        assert_eq!(Scope::from_bits_lossy(0), Scope::ALL);
        assert_eq!(Scope::from_bits_lossy(42), Scope::ALL);
        assert_eq!(Scope::from_bits_lossy(2), Scope::ADMIN);
    }

    #[test]
    fn test_requestable() {
        assert!(Scope::FRONT.is_requestable());
        assert!(Scope::ADMIN.is_requestable());
        assert!(!Scope::ALL.is_requestable());
    }
}
