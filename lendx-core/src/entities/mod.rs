pub mod lending_orders;
pub mod lending_trades;
pub mod notifications;

use bigdecimal::BigDecimal;
use lendx_sdk::objects::{
    AmountParseError, LendingOrderType as SdkLendingOrderType, LendingSide as SdkLendingSide,
    LendingStatus as SdkLendingStatus, NotificationType as SdkNotificationType,
    ReadStatus as SdkReadStatus, TokenAmount,
};

/// Lending side for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `lendx_sdk::objects::LendingSide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE", type_name = "lending_side")]
pub enum LendingSide {
    Borrow,
    Lend,
}

impl From<LendingSide> for SdkLendingSide {
    fn from(value: LendingSide) -> Self {
        match value {
            LendingSide::Borrow => SdkLendingSide::Borrow,
            LendingSide::Lend => SdkLendingSide::Lend,
        }
    }
}

impl From<SdkLendingSide> for LendingSide {
    fn from(value: SdkLendingSide) -> Self {
        match value {
            SdkLendingSide::Borrow => LendingSide::Borrow,
            SdkLendingSide::Lend => LendingSide::Lend,
        }
    }
}

/// Lending status for database operations.
///
/// Unlike the DTO there is no `Unknown` member: storage only ever holds the
/// statuses listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE", type_name = "lending_status")]
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
}

impl LendingStatus {
    /// Statuses whose unfilled quantity still rests on the order book.
    pub const RESTING: [LendingStatus; 2] = [LendingStatus::Open, LendingStatus::PartialFilled];
    /// Statuses a cancel request may still act on.
    pub const CANCELLABLE: [LendingStatus; 2] = [LendingStatus::New, LendingStatus::Open];

    pub fn is_resting(&self) -> bool {
        Self::RESTING.contains(self)
    }

    pub fn is_cancellable(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("status {0} cannot be stored")]
pub struct UnstorableStatus(pub SdkLendingStatus);

impl From<LendingStatus> for SdkLendingStatus {
    fn from(value: LendingStatus) -> Self {
        match value {
            LendingStatus::New => SdkLendingStatus::New,
            LendingStatus::Open => SdkLendingStatus::Open,
            LendingStatus::PartialFilled => SdkLendingStatus::PartialFilled,
            LendingStatus::Filled => SdkLendingStatus::Filled,
            LendingStatus::Cancelled => SdkLendingStatus::Cancelled,
            LendingStatus::Rejected => SdkLendingStatus::Rejected,
            LendingStatus::Repay => SdkLendingStatus::Repay,
            LendingStatus::Topup => SdkLendingStatus::Topup,
            LendingStatus::Recall => SdkLendingStatus::Recall,
        }
    }
}

impl TryFrom<SdkLendingStatus> for LendingStatus {
    type Error = UnstorableStatus;

    fn try_from(value: SdkLendingStatus) -> Result<Self, Self::Error> {
        Ok(match value {
            SdkLendingStatus::New => LendingStatus::New,
            SdkLendingStatus::Open => LendingStatus::Open,
            SdkLendingStatus::PartialFilled => LendingStatus::PartialFilled,
            SdkLendingStatus::Filled => LendingStatus::Filled,
            SdkLendingStatus::Cancelled => LendingStatus::Cancelled,
            SdkLendingStatus::Rejected => LendingStatus::Rejected,
            SdkLendingStatus::Repay => LendingStatus::Repay,
            SdkLendingStatus::Topup => LendingStatus::Topup,
            SdkLendingStatus::Recall => LendingStatus::Recall,
            SdkLendingStatus::Unknown => return Err(UnstorableStatus(value)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "lending_order_type")]
pub enum LendingOrderType {
    #[sqlx(rename = "LO")]
    Limit,
    #[sqlx(rename = "MO")]
    Market,
}

impl From<SdkLendingOrderType> for LendingOrderType {
    fn from(value: SdkLendingOrderType) -> Self {
        match value {
            SdkLendingOrderType::Limit => LendingOrderType::Limit,
            SdkLendingOrderType::Market => LendingOrderType::Market,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE", type_name = "notification_type")]
pub enum NotificationType {
    Log,
    Alert,
}

impl From<NotificationType> for SdkNotificationType {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Log => SdkNotificationType::Log,
            NotificationType::Alert => SdkNotificationType::Alert,
        }
    }
}

impl From<SdkNotificationType> for NotificationType {
    fn from(value: SdkNotificationType) -> Self {
        match value {
            SdkNotificationType::Log => NotificationType::Log,
            SdkNotificationType::Alert => NotificationType::Alert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE", type_name = "read_status")]
pub enum ReadStatus {
    Unread,
    Read,
}

impl From<ReadStatus> for SdkReadStatus {
    fn from(value: ReadStatus) -> Self {
        match value {
            ReadStatus::Unread => SdkReadStatus::Unread,
            ReadStatus::Read => SdkReadStatus::Read,
        }
    }
}

impl From<SdkReadStatus> for ReadStatus {
    fn from(value: SdkReadStatus) -> Self {
        match value {
            SdkReadStatus::Unread => ReadStatus::Unread,
            SdkReadStatus::Read => ReadStatus::Read,
        }
    }
}

/// Order and trade hashes are stored lowercased so lookups ignore the
/// case a client used.
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

/// Token amounts are stored as `NUMERIC(78, 0)`.
pub fn amount_to_numeric(amount: &TokenAmount) -> BigDecimal {
    BigDecimal::new(amount.as_bigint().clone(), 0)
}

/// Read a stored `NUMERIC` back as a token amount. Any fractional part is
/// truncated.
pub fn numeric_to_amount(value: BigDecimal) -> Result<TokenAmount, AmountParseError> {
    let (int, _) = value.with_scale(0).into_bigint_and_exponent();
    TokenAmount::from_bigint(int)
}
