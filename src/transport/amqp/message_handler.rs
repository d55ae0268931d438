//! Pure payload handling and settle decisions for AMQP deliveries.
//!
//! No broker I/O happens here; everything is a plain function over bytes
//! and processing outcomes, testable without a connection.

use crate::processor::ProcessError;
use crate::quote::Quote;
use crate::transport::RequestMessage;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Pure payload handling for AMQP deliveries
pub struct MessageHandler;

impl MessageHandler {
    /// Decode a delivery payload into a request message (pure function)
    ///
    /// The processing stage imposes no encoding constraint on requests, so
    /// invalid UTF-8 is decoded lossily rather than rejected.
    pub fn decode_request(payload: &[u8], delivery_tag: u64) -> RequestMessage {
        RequestMessage {
            payload: String::from_utf8_lossy(payload).into_owned(),
            delivery_tag,
        }
    }

    /// Encode a quote into its JSON wire payload (pure function)
    pub fn encode_quote(quote: &Quote) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(quote)
    }

    /// Decide how to settle a delivery from its processing outcome (pure function)
    ///
    /// A cancelled invocation produced no quote; whether the broker redelivers
    /// it is the configured policy, not the processor's decision.
    pub fn settle_action(
        outcome: &Result<Quote, ProcessError>,
        requeue_on_cancel: bool,
    ) -> SettleAction {
        match outcome {
            Ok(_) => SettleAction::Ack,
            Err(ProcessError::Cancelled) => SettleAction::Reject {
                requeue: requeue_on_cancel,
            },
        }
    }
}

/// How a delivery gets settled after processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleAction {
    /// Processing succeeded and the quote was published
    Ack,
    /// No quote was produced; hand the delivery back to the broker
    Reject { requeue: bool },
}

/// Request forwarding operations (impure I/O)
pub struct RequestForwarder {
    request_sender: Option<mpsc::Sender<RequestMessage>>,
}

impl RequestForwarder {
    pub fn new() -> Self {
        Self {
            request_sender: None,
        }
    }

    pub fn set_request_sender(&mut self, sender: mpsc::Sender<RequestMessage>) {
        self.request_sender = Some(sender);
    }

    /// Forward a decoded request to the dispatch service (impure I/O)
    pub async fn forward_request(&self, request: RequestMessage) -> Result<(), String> {
        if let Some(ref sender) = self.request_sender {
            info!(
                delivery_tag = request.delivery_tag,
                "Forwarding request to dispatch service"
            );

            sender
                .send(request)
                .await
                .map_err(|e| format!("Failed to forward request: {e}"))?;
            Ok(())
        } else {
            warn!("Received delivery but no request sender configured - message dropped");
            Err("No request sender configured".to_string())
        }
    }
}

impl Default for RequestForwarder {
    fn default() -> Self {
        Self::new()
    }
}
