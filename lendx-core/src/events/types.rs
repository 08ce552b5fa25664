use lendx_sdk::objects::LendingOrder;
use serde::{Deserialize, Serialize};

/// The four lending document collections watched for status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    LendingOrder,
    Topup,
    Repay,
    Recall,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::LendingOrder,
        DocumentType::Topup,
        DocumentType::Repay,
        DocumentType::Recall,
    ];

    /// The `pg_notify` channel the document table's trigger publishes on.
    pub fn notify_channel(&self) -> &'static str {
        match self {
            DocumentType::LendingOrder => "lending_orders_changes",
            DocumentType::Topup => "lending_topups_changes",
            DocumentType::Repay => "lending_repays_changes",
            DocumentType::Recall => "lending_recalls_changes",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::LendingOrder => write!(f, "lending"),
            DocumentType::Topup => write!(f, "topup"),
            DocumentType::Repay => write!(f, "repay"),
            DocumentType::Recall => write!(f, "recall"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Insert,
    Update,
    Delete,
    #[serde(other)]
    Other,
}

/// One observed write to a lending document table.
///
/// `full_document` is absent for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingOrderChangeEvent {
    pub operation_type: OperationType,
    #[serde(default)]
    pub full_document: Option<LendingOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendx_sdk::objects::LendingStatus;

    #[test]
    fn test_decodes_trigger_payload() {
        let payload = r#"{
            "operationType": "update",
            "fullDocument": {
                "hash": "0xaa",
                "userAddress": "0x1111111111111111111111111111111111111111",
                "relayerAddress": "0x9999999999999999999999999999999999999999",
                "side": "LEND",
                "term": 2592000,
                "interest": 800,
                "lendingToken": "0x2222222222222222222222222222222222222222",
                "collateralToken": "",
                "quantity": "1000000000000000000000",
                "filledAmount": "0",
                "nonce": 4,
                "type": "LO",
                "status": "OPEN",
                "createdAt": "2024-05-01T10:00:00Z",
                "updatedAt": "2024-05-01T10:00:01.5Z"
            }
        }"#;
        let ev: LendingOrderChangeEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(ev.operation_type, OperationType::Update);
        let doc = ev.full_document.unwrap();
        assert_eq!(doc.status, LendingStatus::Open);
        assert_eq!(doc.quantity.to_string(), "1000000000000000000000");
    }

    #[test]
    fn test_delete_has_no_document() {
        let ev: LendingOrderChangeEvent =
            serde_json::from_str(r#"{"operationType":"delete","fullDocument":null}"#).unwrap();
        assert!(ev.full_document.is_none());
    }
}
