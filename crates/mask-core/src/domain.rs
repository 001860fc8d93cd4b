//! # Data Model
//!
//! Parties and proxy numbers are provisioned out-of-band and read-only to
//! the engine. Transactions are written once by the allocator and never
//! mutated afterwards: there is no close or release operation, so a
//! binding stays in every future exclusion set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{Address, ProviderId, ProxyId, RequesterId, TransactionId};

/// Maximum accepted length of a party display name, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 200;

/// Which side of a transaction a party is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    /// The party asking for the service.
    Requester,
    /// The party performing the service.
    Provider,
}

impl PartyKind {
    /// Lowercase name, used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to one party of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartyRef {
    /// A requester by id.
    Requester(RequesterId),
    /// A provider by id.
    Provider(ProviderId),
}

impl PartyRef {
    /// The kind of the referenced party.
    pub fn kind(&self) -> PartyKind {
        match self {
            Self::Requester(_) => PartyKind::Requester,
            Self::Provider(_) => PartyKind::Provider,
        }
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requester(id) => write!(f, "requester {id}"),
            Self::Provider(id) => write!(f, "provider {id}"),
        }
    }
}

/// A party with a real contact address.
///
/// Requesters and providers share this shape but live in disjoint id
/// spaces; the id type parameter keeps them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party<Id> {
    pub id: Id,
    pub display_name: String,
    pub address: Address,
}

impl<Id> Party<Id> {
    /// Build a party, validating the display name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDisplayName`] if the trimmed name
    /// is empty or longer than [`MAX_DISPLAY_NAME_LEN`].
    pub fn new(
        id: Id,
        display_name: impl Into<String>,
        address: Address,
    ) -> Result<Self, ValidationError> {
        let display_name = validate_display_name(display_name.into())?;
        Ok(Self {
            id,
            display_name,
            address,
        })
    }
}

/// A requester record.
pub type Requester = Party<RequesterId>;

/// A provider record.
pub type Provider = Party<ProviderId>;

/// Trim and bound a display name.
pub fn validate_display_name(raw: String) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidDisplayName("must not be empty"));
    }
    if trimmed.len() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::InvalidDisplayName("too long"));
    }
    Ok(trimmed.to_string())
}

/// A shared address drawn from the proxy pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyNumber {
    pub id: ProxyId,
    pub address: Address,
}

/// Caller-supplied metadata of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub start_location: String,
    pub end_location: String,
    pub scheduled_at: DateTime<Utc>,
}

/// A ledger append request. The ledger assigns the id and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub requester_id: RequesterId,
    pub provider_id: ProviderId,
    pub proxy_id: ProxyId,
    pub details: TransactionDetails,
}

/// An immutable binding of one requester, one provider, and one proxy number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub requester_id: RequesterId,
    pub provider_id: ProviderId,
    pub proxy_id: ProxyId,
    #[serde(flatten)]
    pub details: TransactionDetails,
    pub created_at: DateTime<Utc>,
}

/// A transaction matched by a routing lookup, with both real addresses
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub transaction: Transaction,
    pub requester_address: Address,
    pub provider_address: Address,
    /// How many transactions on the proxy matched the lookup. Values above
    /// one mean the lookup was ambiguous and the earliest match was chosen.
    pub candidates: usize,
}

/// A transaction joined with party names and the proxy address, as the
/// admin surface lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub requester_name: String,
    pub provider_name: String,
    pub start_location: String,
    pub end_location: String,
    pub scheduled_at: DateTime<Utc>,
    pub proxy_address: Address,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn party_name_is_trimmed() {
        let p = Requester::new(RequesterId::new(1), "  Caitlyn Carless ", addr("31970001")).unwrap();
        assert_eq!(p.display_name, "Caitlyn Carless");
    }

    #[test]
    fn party_rejects_blank_name() {
        assert!(Provider::new(ProviderId::new(1), "   ", addr("31970002")).is_err());
    }

    #[test]
    fn party_rejects_overlong_name() {
        let name = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        assert!(Provider::new(ProviderId::new(1), name, addr("31970002")).is_err());
    }

    #[test]
    fn transaction_serializes_details_inline() {
        let tx = Transaction {
            id: TransactionId::new(),
            requester_id: RequesterId::new(1),
            provider_id: ProviderId::new(2),
            proxy_id: ProxyId::new(3),
            details: TransactionDetails {
                start_location: "Central Station".into(),
                end_location: "Airport".into(),
                scheduled_at: Utc::now(),
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["start_location"], "Central Station");
        assert_eq!(json["proxy_id"], 3);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn party_ref_reports_kind() {
        assert_eq!(PartyRef::Requester(RequesterId::new(1)).kind(), PartyKind::Requester);
        assert_eq!(PartyRef::Provider(ProviderId::new(1)).kind(), PartyKind::Provider);
        assert_eq!(PartyRef::Provider(ProviderId::new(9)).to_string(), "provider 9");
    }
}
