//! Lending orders and trades.
//!
//! These are the API/DTO versions. The storage layer in `lendx-core`
//! mirrors the enums as `sqlx::Type`s.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::TokenAmount;

/// Which side of the lending book an order sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LendingSide {
    Borrow,
    Lend,
}

impl std::fmt::Display for LendingSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LendingSide::Borrow => write!(f, "BORROW"),
            LendingSide::Lend => write!(f, "LEND"),
        }
    }
}

/// Order status as written by storage.
///
/// Anything storage writes that is not listed here decodes as `Unknown`
/// and is ignored by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LendingStatus {
    New,
    Open,
    PartialFilled,
    Filled,
    Cancelled,
    Rejected,
    Repay,
    Topup,
    Recall,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LendingStatus::New => "NEW",
            LendingStatus::Open => "OPEN",
            LendingStatus::PartialFilled => "PARTIAL_FILLED",
            LendingStatus::Filled => "FILLED",
            LendingStatus::Cancelled => "CANCELLED",
            LendingStatus::Rejected => "REJECTED",
            LendingStatus::Repay => "REPAY",
            LendingStatus::Topup => "TOPUP",
            LendingStatus::Recall => "RECALL",
            LendingStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Limit or market order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LendingOrderType {
    #[default]
    #[serde(rename = "LO")]
    Limit,
    #[serde(rename = "MO")]
    Market,
}

/// A request to borrow or lend a token for a fixed term at a stated interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingOrder {
    pub hash: String,
    pub user_address: String,
    #[serde(default)]
    pub relayer_address: String,
    pub side: LendingSide,
    /// Loan term in seconds.
    pub term: u64,
    /// Interest rate in the relayer's fixed-point unit.
    pub interest: u64,
    pub lending_token: String,
    #[serde(default)]
    pub collateral_token: String,
    pub quantity: TokenAmount,
    #[serde(default)]
    pub filled_amount: TokenAmount,
    #[serde(default)]
    pub nonce: u64,
    #[serde(rename = "type", default)]
    pub order_type: LendingOrderType,
    #[serde(default)]
    pub status: LendingStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Structural problems with a submitted order.
///
/// Signature and balance checks are not part of this list; they belong to
/// the relayer's validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("order hash is missing")]
    MissingHash,
    #[error("{field} is not a valid address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    #[error("term must be greater than zero")]
    ZeroTerm,
    #[error("interest must be greater than zero")]
    ZeroInterest,
}

/// Returns `true` for a `0x`-prefixed 20-byte hex address.
pub fn is_hex_address(s: &str) -> bool {
    let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) else {
        return false;
    };
    hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

impl LendingOrder {
    /// Channel id of the order book this order belongs to.
    pub fn order_book_channel_id(&self) -> String {
        super::lending_order_book_channel_id(self.term, &self.lending_token)
    }

    /// Check a new order before it is handed to the matching engine.
    pub fn validate_new(&self) -> Result<(), ValidationError> {
        self.validate_identity()?;
        check_address("lendingToken", &self.lending_token)?;
        if self.side == LendingSide::Borrow {
            check_address("collateralToken", &self.collateral_token)?;
        }
        if self.quantity.is_zero() {
            return Err(ValidationError::ZeroQuantity);
        }
        if self.term == 0 {
            return Err(ValidationError::ZeroTerm);
        }
        if self.order_type == LendingOrderType::Limit && self.interest == 0 {
            return Err(ValidationError::ZeroInterest);
        }
        Ok(())
    }

    /// Check a cancellation request. Only the identity fields matter.
    pub fn validate_cancel(&self) -> Result<(), ValidationError> {
        self.validate_identity()
    }

    fn validate_identity(&self) -> Result<(), ValidationError> {
        if self.hash.trim().is_empty() {
            return Err(ValidationError::MissingHash);
        }
        check_address("userAddress", &self.user_address)
    }
}

fn check_address(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if is_hex_address(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        })
    }
}

/// A matched loan, attached to repay / top-up / recall messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingTrade {
    pub hash: String,
    pub borrower: String,
    pub investor: String,
    pub lending_token: String,
    pub collateral_token: String,
    pub borrowing_order_hash: String,
    pub investing_order_hash: String,
    pub term: u64,
    pub interest: u64,
    pub amount: TokenAmount,
    pub collateral_lock_amount: TokenAmount,
    pub liquidation_price: TokenAmount,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "0x1111111111111111111111111111111111111111";
    const TOKEN: &str = "0x2222222222222222222222222222222222222222";
    const COLLATERAL: &str = "0x3333333333333333333333333333333333333333";

    fn order() -> LendingOrder {
        LendingOrder {
            hash: "0xabc".into(),
            user_address: USER.into(),
            relayer_address: String::new(),
            side: LendingSide::Borrow,
            term: 86400,
            interest: 500,
            lending_token: TOKEN.into(),
            collateral_token: COLLATERAL.into(),
            quantity: TokenAmount::from(1_000u64),
            filled_amount: TokenAmount::zero(),
            nonce: 1,
            order_type: LendingOrderType::Limit,
            status: LendingStatus::New,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_decodes_document_with_unknown_status() {
        let json = format!(
            r#"{{"hash":"0xabc","userAddress":"{USER}","side":"LEND","term":60,
                "interest":3,"lendingToken":"{TOKEN}","quantity":"10","status":"WEIRD"}}"#
        );
        let decoded: LendingOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.status, LendingStatus::Unknown);
        assert_eq!(decoded.side, LendingSide::Lend);
        assert!(decoded.filled_amount.is_zero());

        let empty = json.replace("\"WEIRD\"", "\"\"");
        let decoded: LendingOrder = serde_json::from_str(&empty).unwrap();
        assert_eq!(decoded.status, LendingStatus::Unknown);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&LendingStatus::PartialFilled).unwrap(),
            "\"PARTIAL_FILLED\""
        );
        let s: LendingStatus = serde_json::from_str("\"TOPUP\"").unwrap();
        assert_eq!(s, LendingStatus::Topup);
    }

    #[test]
    fn test_validate_new() {
        assert_eq!(order().validate_new(), Ok(()));

        let mut o = order();
        o.hash = " ".into();
        assert_eq!(o.validate_new(), Err(ValidationError::MissingHash));

        let mut o = order();
        o.quantity = TokenAmount::zero();
        assert_eq!(o.validate_new(), Err(ValidationError::ZeroQuantity));

        let mut o = order();
        o.user_address = "0x123".into();
        assert!(matches!(
            o.validate_new(),
            Err(ValidationError::InvalidAddress { field: "userAddress", .. })
        ));

        let mut o = order();
        o.side = LendingSide::Lend;
        o.collateral_token = String::new();
        assert_eq!(o.validate_new(), Ok(()));
    }

    #[test]
    fn test_validate_cancel_ignores_economics() {
        let mut o = order();
        o.quantity = TokenAmount::zero();
        o.term = 0;
        assert_eq!(o.validate_cancel(), Ok(()));
    }
}
