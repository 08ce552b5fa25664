//! ChangeWatcher processor.
//!
//! One watcher runs per [`DocumentType`]. It is responsible for:
//! - Opening a change stream over its document table
//! - Mapping each observed document status to an [`EngineStatus`]
//! - Publishing the resulting [`EngineResponse`] on the response subject

use crate::broker::{Broker, BrokerError};
use crate::events::{DocumentType, LendingOrderChangeEvent};
use crate::store::{ChangeFeed, ChangeFeedError};
use futures_util::StreamExt;
use lendx_sdk::objects::broker::message_types;
use lendx_sdk::objects::{BrokerMessage, EngineResponse, EngineStatus, LendingStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Map a stored status to the lifecycle status it announces.
///
/// `REJECTED` is reported per document type. Statuses with no lifecycle
/// meaning (`NEW`, unknown) map to `None`.
pub fn map_status(status: LendingStatus, doc_type: DocumentType) -> Option<EngineStatus> {
    let mapped = match status {
        LendingStatus::Open => EngineStatus::Added,
        LendingStatus::Cancelled => EngineStatus::Cancelled,
        LendingStatus::Filled => EngineStatus::Filled,
        LendingStatus::PartialFilled => EngineStatus::PartiallyFilled,
        LendingStatus::Repay => EngineStatus::Repayed,
        LendingStatus::Topup => EngineStatus::Topuped,
        LendingStatus::Recall => EngineStatus::Recalled,
        LendingStatus::Rejected => match doc_type {
            DocumentType::LendingOrder => EngineStatus::Rejected,
            DocumentType::Topup => EngineStatus::TopupRejected,
            DocumentType::Repay => EngineStatus::RepayRejected,
            DocumentType::Recall => EngineStatus::RecallRejected,
        },
        LendingStatus::New | LendingStatus::Unknown => return None,
    };
    Some(mapped)
}

/// Turn one change event into an [`EngineResponse`] and publish it.
///
/// Returns the published response, or `None` when the event carried no
/// document or its status has no lifecycle meaning.
pub async fn handle_document_type(
    broker: &dyn Broker,
    response_subject: &str,
    event: LendingOrderChangeEvent,
    doc_type: DocumentType,
) -> Result<Option<EngineResponse>, BrokerError> {
    let Some(document) = event.full_document else {
        return Ok(None);
    };
    let Some(status) = map_status(document.status, doc_type) else {
        debug!(
            doc_type = %doc_type,
            order_hash = %document.hash,
            status = %document.status,
            "Status has no lifecycle event"
        );
        return Ok(None);
    };

    let response = EngineResponse::new(status, document);
    let message = BrokerMessage::new(message_types::LENDING_ORDER_RESPONSE, &response)?;
    broker.publish(response_subject, &message).await?;
    Ok(Some(response))
}

pub struct ChangeWatcher {
    doc_type: DocumentType,
    feed: Arc<dyn ChangeFeed>,
    broker: Arc<dyn Broker>,
    response_subject: String,
}

impl ChangeWatcher {
    pub fn new(
        doc_type: DocumentType,
        feed: Arc<dyn ChangeFeed>,
        broker: Arc<dyn Broker>,
        response_subject: impl Into<String>,
    ) -> Self {
        Self {
            doc_type,
            feed,
            broker,
            response_subject: response_subject.into(),
        }
    }

    /// Run the watcher until shutdown or until its change stream ends.
    ///
    /// Failing to open the stream terminates only this watcher.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let doc_type = self.doc_type;
        info!(doc_type = %doc_type, "ChangeWatcher started");

        let mut stream = match self.feed.watch(doc_type).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(doc_type = %doc_type, error = %e, "Failed to open change stream");
                return;
            }
        };

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(doc_type = %doc_type, "ChangeWatcher received shutdown signal");
                        break;
                    }
                }

                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            debug!(
                                doc_type = %doc_type,
                                operation = ?event.operation_type,
                                "Lending change observed"
                            );
                            if let Err(e) = handle_document_type(
                                self.broker.as_ref(),
                                &self.response_subject,
                                event,
                                doc_type,
                            )
                            .await
                            {
                                error!(
                                    doc_type = %doc_type,
                                    error = %e,
                                    "Failed to publish engine response"
                                );
                            }
                        }
                        Some(Err(ChangeFeedError::Decode(e))) => {
                            warn!(doc_type = %doc_type, error = %e, "Skipping undecodable change");
                        }
                        Some(Err(e)) => {
                            error!(doc_type = %doc_type, error = %e, "Change stream failed");
                            break;
                        }
                        None => {
                            error!(doc_type = %doc_type, "Change stream closed");
                            break;
                        }
                    }
                }
            }
        }

        info!(doc_type = %doc_type, "ChangeWatcher shutdown complete");
    }
}
