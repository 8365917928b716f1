//! Entitlement resolution: tier(s) to concrete limits.

use crate::model::License;
use crate::tier::{Limit, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The limits an owner may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    /// Best tier among the licenses considered.
    pub tier: Tier,
    pub max_activations: Limit,
    pub max_pipelines: Limit,
}

impl Entitlements {
    /// Entitlements granted by a single tier.
    #[must_use]
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            tier,
            max_activations: tier.max_activations(),
            max_pipelines: tier.max_pipelines(),
        }
    }

    /// Entitlements of an owner holding `licenses`.
    ///
    /// Only licenses usable at `now` count. Each limit is the maximum across
    /// them, never the sum, so holding several licenses does not stack and a
    /// new license never lowers what an existing one grants. Owners without a
    /// usable license fall back to community.
    #[must_use]
    pub fn for_licenses<'a, I>(licenses: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a License>,
    {
        licenses
            .into_iter()
            .filter(|license| license.ensure_usable(now).is_ok())
            .map(|license| Self {
                tier: license.tier,
                max_activations: license.max_activations,
                max_pipelines: license.tier.max_pipelines(),
            })
            .reduce(|best, next| Self {
                tier: best.tier.max(next.tier),
                max_activations: best.max_activations.max(next.max_activations),
                max_pipelines: best.max_pipelines.max(next.max_pipelines),
            })
            .unwrap_or_else(|| Self::for_tier(Tier::Community))
    }
}
