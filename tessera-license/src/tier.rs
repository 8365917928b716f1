//! Product tiers and numeric limits.

use crate::error::LicenseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The feature tier a license grants. Ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier.
    Community,
    /// Time-limited evaluation of the paid feature set.
    Trial,
    /// Paid subscription.
    Pro,
    /// Paid subscription without device or pipeline caps.
    Enterprise,
}

/// Tiers that replace each other on re-issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierFamily {
    /// The free community tier.
    Free,
    /// Trial, pro and enterprise.
    Subscription,
}

impl Tier {
    /// All tiers, least capable first.
    pub const ALL: [Tier; 4] = [Tier::Community, Tier::Trial, Tier::Pro, Tier::Enterprise];

    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Trial => "trial",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Returns the re-issuance family.
    #[must_use]
    pub fn family(&self) -> TierFamily {
        match self {
            Self::Community => TierFamily::Free,
            Self::Trial | Self::Pro | Self::Enterprise => TierFamily::Subscription,
        }
    }

    /// Maximum number of machines that may hold a live activation.
    #[must_use]
    pub fn max_activations(&self) -> Limit {
        match self {
            Self::Community => Limit::Bounded(1),
            Self::Trial => Limit::Bounded(2),
            Self::Pro => Limit::Bounded(5),
            Self::Enterprise => Limit::Unbounded,
        }
    }

    /// Maximum number of concurrently running replication pipelines.
    #[must_use]
    pub fn max_pipelines(&self) -> Limit {
        match self {
            Self::Community => Limit::Bounded(1),
            Self::Trial => Limit::Bounded(5),
            Self::Pro => Limit::Bounded(10),
            Self::Enterprise => Limit::Unbounded,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "community" => Ok(Self::Community),
            "trial" => Ok(Self::Trial),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(LicenseError::InvalidTier(s.to_string())),
        }
    }
}

/// An upper bound on a counted resource.
///
/// `Unbounded` sorts above every `Bounded` value and has no numeric
/// representation, so it cannot be decremented into a finite cap. It is
/// stored as SQL `NULL` and serialized as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Limit {
    /// At most this many.
    Bounded(u32),
    /// No cap.
    Unbounded,
}

impl Limit {
    /// Returns true if one more unit fits when `current` are already in use.
    #[must_use]
    pub fn admits(self, current: u32) -> bool {
        match self {
            Self::Bounded(max) => current < max,
            Self::Unbounded => true,
        }
    }

    /// Returns the finite cap, or `None` when unbounded.
    #[must_use]
    pub fn get(self) -> Option<u32> {
        match self {
            Self::Bounded(max) => Some(max),
            Self::Unbounded => None,
        }
    }

    /// Returns true for [`Limit::Unbounded`].
    #[must_use]
    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl From<Option<u32>> for Limit {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Self::Unbounded, Self::Bounded)
    }
}

impl From<Limit> for Option<u32> {
    fn from(limit: Limit) -> Self {
        limit.get()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{max}"),
            Self::Unbounded => f.write_str("unlimited"),
        }
    }
}
