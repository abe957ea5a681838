//! Protection zones and tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A protection tier: the level of cover protection a scene applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Medium protection
    T1,
    /// Intense protection
    T2,
}

impl Tier {
    /// Stable identifier used for scene lookup and events
    pub fn id(&self) -> &'static str {
        match self {
            Tier::T1 => "t1",
            Tier::T2 => "t2",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// The controller's current protection zone
///
/// Ordered `None < T1 < T2`; an advance only ever moves up this order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// No protection active
    #[default]
    None,
    /// Medium protection active
    T1,
    /// Intense protection active
    T2,
}

impl Zone {
    /// The tier this zone corresponds to, if any
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Zone::None => None,
            Zone::T1 => Some(Tier::T1),
            Zone::T2 => Some(Tier::T2),
        }
    }

    /// Whether a protection tier is active
    pub fn is_protecting(&self) -> bool {
        !matches!(self, Zone::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::None => "none",
            Zone::T1 => "t1",
            Zone::T2 => "t2",
        }
    }
}

impl From<Tier> for Zone {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::T1 => Zone::T1,
            Tier::T2 => Zone::T2,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a zone name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown zone '{0}', expected one of: none, t1, t2")]
pub struct ParseZoneError(pub String);

impl FromStr for Zone {
    type Err = ParseZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "" => Ok(Zone::None),
            "t1" => Ok(Zone::T1),
            "t2" => Ok(Zone::T2),
            _ => Err(ParseZoneError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_ordering() {
        assert!(Zone::None < Zone::T1);
        assert!(Zone::T1 < Zone::T2);
        assert_eq!(Zone::default(), Zone::None);
    }

    #[test]
    fn test_zone_tier_round_trip() {
        assert_eq!(Zone::from(Tier::T2).tier(), Some(Tier::T2));
        assert_eq!(Zone::None.tier(), None);
        assert!(!Zone::None.is_protecting());
        assert!(Zone::T1.is_protecting());
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!("T2".parse::<Zone>().unwrap(), Zone::T2);
        assert_eq!(" none ".parse::<Zone>().unwrap(), Zone::None);
        assert!("t3".parse::<Zone>().is_err());
    }

    #[test]
    fn test_zone_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Zone::T1).unwrap(), "\"t1\"");
        let zone: Zone = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(zone, Zone::None);
    }
}
