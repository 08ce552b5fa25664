//! Engine responses: lifecycle outcomes reported by the matching engine or
//! observed on storage.

use serde::{Deserialize, Serialize};

use super::LendingOrder;

/// Lifecycle status tag carried by an [`EngineResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    #[serde(rename = "LENDING_ORDER_ADDED")]
    Added,
    #[serde(rename = "LENDING_ORDER_CANCELLED")]
    Cancelled,
    #[serde(rename = "LENDING_ORDER_REJECTED")]
    Rejected,
    #[serde(rename = "LENDING_ORDER_PARTIALLY_FILLED")]
    PartiallyFilled,
    #[serde(rename = "LENDING_ORDER_FILLED")]
    Filled,
    #[serde(rename = "LENDING_ORDER_REPAYED")]
    Repayed,
    #[serde(rename = "LENDING_ORDER_TOPUPED")]
    Topuped,
    #[serde(rename = "LENDING_ORDER_RECALLED")]
    Recalled,
    #[serde(rename = "LENDING_ORDER_TOPUP_REJECTED")]
    TopupRejected,
    #[serde(rename = "LENDING_ORDER_REPAY_REJECTED")]
    RepayRejected,
    #[serde(rename = "LENDING_ORDER_RECALL_REJECTED")]
    RecallRejected,
    #[serde(rename = "ERROR")]
    Error,
    /// Any tag this build does not know about.
    #[serde(rename = "UNKNOWN")]
    #[serde(other)]
    Unknown,
}

impl EngineStatus {
    /// Every status a dispatcher must account for, `Unknown` included.
    pub const ALL: [EngineStatus; 13] = [
        EngineStatus::Added,
        EngineStatus::Cancelled,
        EngineStatus::Rejected,
        EngineStatus::PartiallyFilled,
        EngineStatus::Filled,
        EngineStatus::Repayed,
        EngineStatus::Topuped,
        EngineStatus::Recalled,
        EngineStatus::TopupRejected,
        EngineStatus::RepayRejected,
        EngineStatus::RecallRejected,
        EngineStatus::Error,
        EngineStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Added => "LENDING_ORDER_ADDED",
            EngineStatus::Cancelled => "LENDING_ORDER_CANCELLED",
            EngineStatus::Rejected => "LENDING_ORDER_REJECTED",
            EngineStatus::PartiallyFilled => "LENDING_ORDER_PARTIALLY_FILLED",
            EngineStatus::Filled => "LENDING_ORDER_FILLED",
            EngineStatus::Repayed => "LENDING_ORDER_REPAYED",
            EngineStatus::Topuped => "LENDING_ORDER_TOPUPED",
            EngineStatus::Recalled => "LENDING_ORDER_RECALLED",
            EngineStatus::TopupRejected => "LENDING_ORDER_TOPUP_REJECTED",
            EngineStatus::RepayRejected => "LENDING_ORDER_REPAY_REJECTED",
            EngineStatus::RecallRejected => "LENDING_ORDER_RECALL_REJECTED",
            EngineStatus::Error => "ERROR",
            EngineStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ephemeral lifecycle event for one order. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub status: EngineStatus,
    pub lending_order: LendingOrder,
}

impl EngineResponse {
    pub fn new(status: EngineStatus, lending_order: LendingOrder) -> Self {
        Self {
            status,
            lending_order,
        }
    }
}
