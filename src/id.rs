//! Identifiers and the locator codec.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::Error;

/// Identifier of an [`App`](crate::App).
///
/// Backed by a random v4 UUID, so two apps never share an id in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub Uuid);

impl AppId {
    /// Generate a fresh app id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a [`Volume`](crate::Volume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub Uuid);

impl VolumeId {
    /// Generate a fresh volume id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VolumeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a binding inside its volume.
///
/// This is the key of the volume's binding arena. Bindings are never removed, so keys are
/// handed out in creation order and never reused; ordering by id is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub usize);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses one binding of one volume of one app.
///
/// The string form is `"{app}/{volume}/{binding}"` and parses back to exactly the same triple.
///
/// # Examples
///
/// ```
/// # use volume_flow::{AppId, BindingId, Locator, VolumeId};
/// let locator = Locator {
///     app: AppId::new(),
///     volume: VolumeId::new(),
///     binding: BindingId(7),
/// };
/// let parsed: Locator = locator.to_string().parse().unwrap();
/// assert_eq!(parsed, locator);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    /// The app owning the volume.
    pub app: AppId,
    /// The volume owning the binding.
    pub volume: VolumeId,
    /// The binding itself.
    pub binding: BindingId,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app, self.volume, self.binding)
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidLocator {
            locator: s.to_string(),
        };
        let mut segments = s.split('/');
        let (Some(app), Some(volume), Some(binding), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid());
        };
        // Only canonical digits; `usize::from_str` would also accept a leading '+'.
        if binding.is_empty() || !binding.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let locator = Locator {
            app: AppId(Uuid::parse_str(app).map_err(|_| invalid())?),
            volume: VolumeId(Uuid::parse_str(volume).map_err(|_| invalid())?),
            binding: BindingId(binding.parse().map_err(|_| invalid())?),
        };
        // `Uuid::parse_str` also takes braced, simple, urn and uppercase forms.
        if locator.to_string() != s {
            return Err(invalid());
        }
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(binding: usize) -> Locator {
        Locator {
            app: AppId::new(),
            volume: VolumeId::new(),
            binding: BindingId(binding),
        }
    }

    #[test]
    fn test_locator_round_trip() {
        for binding in [0, 1, 42, usize::MAX] {
            let loc = locator(binding);
            assert_eq!(loc.to_string().parse::<Locator>().unwrap(), loc);
        }
    }

    #[test]
    fn test_locator_rejects_malformed() {
        let good = locator(3).to_string();
        let (prefix, _) = good.rsplit_once('/').unwrap();

        for bad in [
            String::new(),
            "a/b/c".to_string(),
            prefix.to_string(),
            format!("{prefix}/"),
            format!("{prefix}/+3"),
            format!("{prefix}/3/4"),
            format!("{prefix}/x"),
            format!("{prefix}/03"),
        ] {
            assert!(
                matches!(bad.parse::<Locator>(), Err(Error::InvalidLocator { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_locator_rejects_non_canonical_uuids() {
        let loc = locator(3);
        let app = loc.app.0;
        let volume = loc.volume.0.hyphenated().to_string();

        for form in [
            app.hyphenated().to_string().to_uppercase(),
            app.braced().to_string(),
            app.simple().to_string(),
            app.urn().to_string(),
        ] {
            let bad = format!("{form}/{volume}/3");
            assert!(
                matches!(bad.parse::<Locator>(), Err(Error::InvalidLocator { .. })),
                "accepted {bad:?}"
            );
        }
        assert_eq!(format!("{app}/{volume}/3").parse::<Locator>().unwrap(), loc);
    }

    #[test]
    fn test_fresh_ids_differ() {
        assert_ne!(AppId::new(), AppId::new());
        assert_ne!(VolumeId::new(), VolumeId::new());
    }
}
