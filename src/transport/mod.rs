//! Transport layer for broker communication.
//!
//! This module provides the transport abstraction and the AMQP
//! implementation used to consume quote requests and publish quotes.

use crate::quote::Quote;

pub mod amqp;

/// One decoded inbound delivery, forwarded from the transport to the
/// dispatch service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    /// Raw request payload, decoded as text
    pub payload: String,
    /// Broker delivery tag used to settle the message after processing
    pub delivery_tag: u64,
}

/// Transport trait for broker communication
///
/// This trait provides an abstraction over the message broker to enable
/// dependency injection and testing.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the broker and declare the configured resources
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Disconnect from the broker
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Begin consuming the requests queue
    async fn subscribe_to_requests(&mut self) -> Result<(), Self::Error>;

    /// Publish a quote to the quotes exchange
    async fn publish_quote(&self, quote: &Quote) -> Result<(), Self::Error>;

    /// Acknowledge a processed delivery
    async fn ack(&self, delivery_tag: u64) -> Result<(), Self::Error>;

    /// Reject an unprocessed delivery, optionally requeueing it
    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Self::Error>;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool;

    /// Set the sender used to forward received requests to the dispatch service
    async fn set_request_sender(&self, sender: tokio::sync::mpsc::Sender<RequestMessage>);
}

/// Type alias for AMQP transport
pub type AmqpTransport = amqp::AmqpClient;
