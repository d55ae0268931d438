//! Mock implementations for testing
//!
//! Provides a mock Transport implementation to test the dispatch service
//! without a running broker.

use crate::error::ServiceError;
use crate::quote::Quote;
use crate::transport::{RequestMessage, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Mock transport for testing
///
/// Clones share the same capture buffers, so a test can keep a handle to
/// inspect what the service did with its copy.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    pub published_quotes: Arc<Mutex<Vec<Quote>>>,
    pub acked: Arc<Mutex<Vec<u64>>>,
    pub rejected: Arc<Mutex<Vec<(u64, bool)>>>,
    pub connected: Arc<Mutex<bool>>,
    pub should_fail_publish: bool,
    pub request_sender: Arc<Mutex<Option<mpsc::Sender<RequestMessage>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose publishes fail, for error-path testing
    pub fn with_publish_failure() -> Self {
        Self {
            should_fail_publish: true,
            ..Default::default()
        }
    }

    /// Push a request into the service as if the broker delivered it
    pub async fn inject_request(&self, payload: &str, delivery_tag: u64) -> Result<(), String> {
        let guard = self.request_sender.lock().await;
        match guard.as_ref() {
            Some(sender) => sender
                .send(RequestMessage {
                    payload: payload.to_string(),
                    delivery_tag,
                })
                .await
                .map_err(|e| format!("Failed to inject request: {e}")),
            None => Err("No request sender configured".to_string()),
        }
    }

    pub async fn get_published_quotes(&self) -> Vec<Quote> {
        self.published_quotes.lock().await.clone()
    }

    pub async fn get_acked(&self) -> Vec<u64> {
        self.acked.lock().await.clone()
    }

    pub async fn get_rejected(&self) -> Vec<(u64, bool)> {
        self.rejected.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.published_quotes.lock().await.clear();
        self.acked.lock().await.clear();
        self.rejected.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = ServiceError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        *self.connected.lock().await = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        *self.connected.lock().await = false;
        Ok(())
    }

    async fn subscribe_to_requests(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn publish_quote(&self, quote: &Quote) -> Result<(), Self::Error> {
        if self.should_fail_publish {
            return Err(ServiceError::internal("Mock publish failure"));
        }

        self.published_quotes.lock().await.push(quote.clone());
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), Self::Error> {
        self.acked.lock().await.push(delivery_tag);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Self::Error> {
        self.rejected.lock().await.push((delivery_tag, requeue));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // Capture buffers use async locks; connection state is only read
        // synchronously in tests after explicit connect/disconnect calls.
        self.connected
            .try_lock()
            .map(|connected| *connected)
            .unwrap_or(false)
    }

    async fn set_request_sender(&self, sender: mpsc::Sender<RequestMessage>) {
        *self.request_sender.lock().await = Some(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_captures_activity() {
        let mut transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        transport
            .publish_quote(&Quote::new("silver", 5))
            .await
            .unwrap();
        transport.ack(1).await.unwrap();
        transport.reject(2, true).await.unwrap();

        assert_eq!(transport.get_published_quotes().await.len(), 1);
        assert_eq!(transport.get_acked().await, vec![1]);
        assert_eq!(transport.get_rejected().await, vec![(2, true)]);

        transport.clear_history().await;
        assert!(transport.get_published_quotes().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_transport_publish_failure() {
        let transport = MockTransport::with_publish_failure();
        let result = transport.publish_quote(&Quote::new("silver", 5)).await;
        assert!(result.is_err());
        assert!(transport.get_published_quotes().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_transport_clones_share_state() {
        let transport = MockTransport::new();
        let observer = transport.clone();

        transport.ack(9).await.unwrap();
        assert_eq!(observer.get_acked().await, vec![9]);
    }

    #[tokio::test]
    async fn test_inject_request_requires_sender() {
        let transport = MockTransport::new();
        assert!(transport.inject_request("silver", 1).await.is_err());

        let (tx, mut rx) = mpsc::channel(1);
        transport.set_request_sender(tx).await;
        transport.inject_request("silver", 1).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload, "silver");
        assert_eq!(received.delivery_tag, 1);
    }
}
