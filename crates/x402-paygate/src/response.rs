use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receipt returned by the settlement service on success.
///
/// Every field is optional on the wire; facilitators differ in what they echo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettlementReceipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Transaction hash, if the facilitator reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

/// Raw HTTP-equivalent reply from the settlement service, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilitatorReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FacilitatorReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Convenience for building a reply from a JSON value.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Outcome of one settlement attempt. Resource delivery is conditioned on
/// [`SettlementResult::Settled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementResult {
    Settled {
        receipt: SettlementReceipt,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        reason_code: String,
    },
    FacilitatorUnavailable {
        cause: String,
    },
}

impl SettlementResult {
    pub fn is_settled(&self) -> bool {
        matches!(self, SettlementResult::Settled { .. })
    }
}
