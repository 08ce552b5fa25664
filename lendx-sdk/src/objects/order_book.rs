//! Order-book snapshots broadcast on the `lending_orderbook` channel.

use serde::{Deserialize, Serialize};

use super::TokenAmount;

/// Channel id of the lending order book for a term / lending token pair.
///
/// Token addresses are lower-cased so that subscribers and publishers agree
/// regardless of checksum casing.
pub fn lending_order_book_channel_id(term: u64, lending_token: &str) -> String {
    format!("{}::{}", term, lending_token.to_lowercase())
}

/// Aggregate open volume at one interest rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    #[serde(with = "super::u64_string")]
    pub interest: u64,
    pub amount: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingOrderBook {
    /// The channel id, `"<term>::<lendingToken>"`.
    pub name: String,
    pub borrow: Vec<OrderBookLevel>,
    pub lend: Vec<OrderBookLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_format() {
        let book = LendingOrderBook {
            name: lending_order_book_channel_id(86400, "0xAbCd"),
            borrow: vec![OrderBookLevel {
                interest: 800,
                amount: "100000000000000000000000".parse().unwrap(),
            }],
            lend: vec![],
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "86400::0xabcd",
                "borrow": [{"interest": "800", "amount": "100000000000000000000000"}],
                "lend": []
            })
        );
    }
}
