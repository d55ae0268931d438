//! Dispatch service: one processing invocation per inbound request.
//!
//! Receives decoded requests from the transport over an mpsc channel and
//! hands each one to the [`QuoteProcessor`] on its own task, bounded by a
//! worker-pool semaphore. The receive loop itself never blocks on
//! processing, so a slow invocation cannot stall delivery of other
//! messages.

use crate::config::ProcessorConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::processor::QuoteProcessor;
use crate::transport::amqp::message_handler::{MessageHandler, SettleAction};
use crate::transport::{RequestMessage, Transport};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the transport-to-service request channel
const REQUEST_CHANNEL_CAPACITY: usize = 100;

/// Quote dispatch service, generic over the broker transport
pub struct QuoteService<T: Transport> {
    processor: QuoteProcessor,
    transport: Arc<T>,
    request_rx: mpsc::Receiver<RequestMessage>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    requeue_on_cancel: bool,
    shutdown: CancellationToken,
}

impl<T: Transport + 'static> QuoteService<T> {
    /// Connect the transport, wire it to a fresh request channel, and build
    /// the service around it.
    pub async fn start(
        config: &ProcessorConfig,
        mut transport: T,
        shutdown: CancellationToken,
    ) -> ServiceResult<Self> {
        transport.connect().await.map_err(ServiceError::transport)?;

        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        transport.set_request_sender(request_tx).await;
        transport
            .subscribe_to_requests()
            .await
            .map_err(ServiceError::transport)?;

        let worker_count = config.processor.workers;
        info!(
            processor_id = %config.processor.id,
            workers = worker_count,
            work_duration_ms = config.processor.work_duration_ms,
            "Quote service started"
        );

        Ok(Self {
            processor: QuoteProcessor::new(config.processor.work_duration()),
            transport: Arc::new(transport),
            request_rx,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            requeue_on_cancel: config.amqp.requeue_on_cancel,
            shutdown,
        })
    }

    /// Run the dispatch loop until shutdown or until the transport closes
    /// the request channel.
    pub async fn run(mut self) -> ServiceResult<()> {
        loop {
            let request = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping dispatch loop");
                    break;
                }
                maybe_request = self.request_rx.recv() => match maybe_request {
                    Some(request) => request,
                    None => {
                        info!("Request channel closed, stopping dispatch loop");
                        break;
                    }
                },
            };

            self.dispatch(request).await?;
        }

        self.drain().await;

        // Workers drop their transport handles before releasing their
        // permits, so after the drain the service holds the last one
        match Arc::try_unwrap(self.transport) {
            Ok(mut transport) => {
                if let Err(e) = transport.disconnect().await {
                    warn!(error = %e, "Transport disconnect failed");
                }
            }
            Err(_) => warn!("Transport still shared at shutdown, skipping disconnect"),
        }

        Ok(())
    }

    /// Hand one request to the processor on its own task, gated by the
    /// worker pool.
    async fn dispatch(&self, request: RequestMessage) -> ServiceResult<()> {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::internal("worker pool closed"))?;

        debug!(delivery_tag = request.delivery_tag, "Dispatching request");

        let processor = self.processor.clone();
        let transport = self.transport.clone();
        let cancel = self.shutdown.clone();
        let requeue_on_cancel = self.requeue_on_cancel;

        tokio::spawn(async move {
            let _permit = permit;
            handle_request(&processor, transport, request, &cancel, requeue_on_cancel).await;
        });

        Ok(())
    }

    /// Wait for all in-flight invocations to settle their deliveries.
    async fn drain(&self) {
        let _ = self.workers.acquire_many(self.worker_count as u32).await;
        info!("All in-flight invocations settled");
    }
}

/// Process a single request end to end: invoke the stage, publish the
/// quote, settle the delivery.
async fn handle_request<T: Transport>(
    processor: &QuoteProcessor,
    transport: Arc<T>,
    request: RequestMessage,
    cancel: &CancellationToken,
    requeue_on_cancel: bool,
) {
    let delivery_tag = request.delivery_tag;
    let outcome = processor.process(&request.payload, cancel).await;

    match &outcome {
        Ok(quote) => {
            debug!(
                delivery_tag,
                quote_value = quote.quote_value,
                "Request processed"
            );
            if let Err(e) = transport.publish_quote(quote).await {
                // The quote never left the process; hand the request back to
                // the broker instead of acking it away.
                error!(error = %e, delivery_tag, "Failed to publish quote");
                settle(&*transport, delivery_tag, SettleAction::Reject { requeue: true }).await;
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, delivery_tag, "Invocation produced no quote");
        }
    }

    settle(
        &*transport,
        delivery_tag,
        MessageHandler::settle_action(&outcome, requeue_on_cancel),
    )
    .await;
}

async fn settle<T: Transport>(transport: &T, delivery_tag: u64, action: SettleAction) {
    let result = match action {
        SettleAction::Ack => transport.ack(delivery_tag).await,
        SettleAction::Reject { requeue } => transport.reject(delivery_tag, requeue).await,
    };

    if let Err(e) = result {
        error!(error = %e, delivery_tag, ?action, "Failed to settle delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockTransport;

    #[tokio::test]
    async fn test_start_connects_and_wires_transport() {
        let config = ProcessorConfig::test_config();
        let transport = MockTransport::new();
        let observer = transport.clone();

        let service = QuoteService::start(&config, transport, CancellationToken::new())
            .await
            .unwrap();

        assert!(observer.is_connected());
        assert!(observer.request_sender.lock().await.is_some());
        drop(service);
    }

    #[tokio::test]
    async fn test_run_exits_on_immediate_shutdown() {
        let config = ProcessorConfig::test_config();
        let shutdown = CancellationToken::new();

        let service = QuoteService::start(&config, MockTransport::new(), shutdown.clone())
            .await
            .unwrap();

        shutdown.cancel();
        service.run().await.unwrap();
    }
}
