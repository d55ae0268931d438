//! Impure I/O operations for the AMQP client.
//!
//! Owns the lapin connection and channel, declares the configured broker
//! resources, and runs the consumer task that forwards decoded deliveries
//! to the dispatch service. Deliveries are never processed on the consumer
//! task itself.

use super::connection::{
    build_connection_uri, build_consumer_tag, exchange_declare_options, prefetch_count,
    queue_declare_options, AmqpError,
};
use super::message_handler::{MessageHandler, RequestForwarder};
use crate::config::ProcessorConfig;
use crate::quote::Quote;
use crate::transport::{RequestMessage, Transport};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// AMQP transport client backed by lapin
pub struct AmqpClient {
    config: ProcessorConfig,
    connection: Option<Connection>,
    channel: Option<Channel>,
    consumer_handle: Option<JoinHandle<()>>,
    request_forwarder: Arc<Mutex<RequestForwarder>>,
}

impl AmqpClient {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            connection: None,
            channel: None,
            consumer_handle: None,
            request_forwarder: Arc::new(Mutex::new(RequestForwarder::new())),
        }
    }

    fn channel(&self) -> Result<&Channel, AmqpError> {
        self.channel.as_ref().ok_or(AmqpError::NotConnected)
    }

    /// Declare the queue and exchange named by the channel bindings.
    ///
    /// Both ends are declared so the processor can start before any
    /// producer or consumer exists on the broker.
    async fn declare_resources(&self, channel: &Channel) -> Result<(), AmqpError> {
        let bindings = &self.config.channels;

        channel
            .exchange_declare(
                &bindings.quotes_exchange,
                ExchangeKind::Fanout,
                exchange_declare_options(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::DeclarationFailed {
                resource: format!("exchange '{}'", bindings.quotes_exchange),
                source: e,
            })?;

        channel
            .queue_declare(
                &bindings.requests_queue,
                queue_declare_options(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::DeclarationFailed {
                resource: format!("queue '{}'", bindings.requests_queue),
                source: e,
            })?;

        info!(
            queue = %bindings.requests_queue,
            exchange = %bindings.quotes_exchange,
            "Broker resources declared"
        );
        Ok(())
    }
}

#[async_trait]
impl Transport for AmqpClient {
    type Error = AmqpError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        let uri = build_connection_uri(&self.config)?;

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(AmqpError::ConnectionFailed)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(AmqpError::ConnectionFailed)?;

        // Bound unacked deliveries to what the worker pool can hold in flight
        channel
            .basic_qos(
                prefetch_count(self.config.processor.workers),
                BasicQosOptions::default(),
            )
            .await
            .map_err(AmqpError::ConnectionFailed)?;

        self.declare_resources(&channel).await?;

        info!(broker_url = %self.config.amqp.broker_url, "AMQP transport connected");
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        if let Some(handle) = self.consumer_handle.take() {
            handle.abort();
        }
        self.channel = None;

        if let Some(connection) = self.connection.take() {
            connection
                .close(200, "shutting down")
                .await
                .map_err(AmqpError::ConnectionFailed)?;
            info!("AMQP transport disconnected");
        }
        Ok(())
    }

    async fn subscribe_to_requests(&mut self) -> Result<(), Self::Error> {
        let channel = self.channel()?;
        let queue = self.config.channels.requests_queue.clone();
        let consumer_tag = build_consumer_tag(&self.config.processor.id);

        let mut consumer = channel
            .basic_consume(
                &queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(AmqpError::SubscriptionFailed)?;

        let forwarder = self.request_forwarder.clone();
        let handle = tokio::spawn(async move {
            info!(queue = %queue, "Request consumer started");

            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let request = MessageHandler::decode_request(
                            &delivery.data,
                            delivery.delivery_tag,
                        );
                        let forwarder = forwarder.lock().await;
                        if let Err(e) = forwarder.forward_request(request).await {
                            warn!(error = %e, "Inbound delivery dropped");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Consumer stream error");
                    }
                }
            }

            info!(queue = %queue, "Request consumer stream closed");
        });

        self.consumer_handle = Some(handle);
        Ok(())
    }

    async fn publish_quote(&self, quote: &Quote) -> Result<(), Self::Error> {
        let channel = self.channel()?;
        let payload = MessageHandler::encode_quote(quote).map_err(AmqpError::SerializationError)?;

        let _confirm = channel
            .basic_publish(
                &self.config.channels.quotes_exchange,
                "",
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(AmqpError::PublishFailed)?;

        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), Self::Error> {
        self.channel()?
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| AmqpError::SettleFailed {
                delivery_tag,
                source: e,
            })
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Self::Error> {
        self.channel()?
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| AmqpError::SettleFailed {
                delivery_tag,
                source: e,
            })
    }

    fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.status().connected())
            .unwrap_or(false)
    }

    async fn set_request_sender(&self, sender: mpsc::Sender<RequestMessage>) {
        let mut forwarder = self.request_forwarder.lock().await;
        forwarder.set_request_sender(sender);
    }
}

impl Drop for AmqpClient {
    fn drop(&mut self) {
        // The lapin connection closes itself on drop; only the consumer
        // task needs stopping explicitly.
        if let Some(handle) = self.consumer_handle.take() {
            handle.abort();
        }
    }
}
