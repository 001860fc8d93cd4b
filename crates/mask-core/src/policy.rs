//! # Exclusion Policy
//!
//! Decides which proxy numbers a prospective (requester, provider) pair
//! may not be bound to.
//!
//! - [`ExclusionPolicy::Union`] excludes every proxy number either party
//!   has ever used with anyone. Each party then sees a given proxy number
//!   at most once, so an inbound (proxy, sender) pair always identifies a
//!   single transaction.
//! - [`ExclusionPolicy::PerPair`] excludes proxy numbers that both parties
//!   have used, which always covers the pair's own history. A party may
//!   then meet one proxy number with several counterparties. The pool
//!   stretches further, but a party holding two transactions on one proxy
//!   number makes routing ambiguous; the ledger then resolves to the
//!   earliest transaction.
//!
//! Both policies guarantee that a pair never repeats a proxy number, and
//! both reject anything in `used(requester) ∩ used(provider)`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::ProxyId;

/// Rule for computing the exclusion set of a prospective pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionPolicy {
    /// Exclude everything used by the requester or by the provider.
    #[default]
    Union,
    /// Exclude what both the requester and the provider have used.
    PerPair,
}

impl ExclusionPolicy {
    /// Configuration name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::PerPair => "per-pair",
        }
    }

    /// Compute the exclusion set from a pair's binding history.
    pub fn excluded(&self, history: &ExclusionHistory) -> BTreeSet<ProxyId> {
        match self {
            Self::Union => history
                .requester
                .union(&history.provider)
                .copied()
                .collect(),
            Self::PerPair => history
                .requester
                .intersection(&history.provider)
                .copied()
                .collect(),
        }
    }
}

impl fmt::Display for ExclusionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExclusionPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "union" => Ok(Self::Union),
            "per-pair" | "per_pair" | "pair" => Ok(Self::PerPair),
            other => Err(ValidationError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Proxy numbers previously bound to the parties of a prospective pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionHistory {
    /// Bound to any transaction of the requester.
    pub requester: BTreeSet<ProxyId>,
    /// Bound to any transaction of the provider.
    pub provider: BTreeSet<ProxyId>,
    /// Bound to a transaction of exactly this requester and provider.
    pub pair: BTreeSet<ProxyId>,
}
