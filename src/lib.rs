//! Quote processor service
//!
//! A single-stage message transformer over RabbitMQ: consumes text requests
//! from the `quote-requests` queue, simulates a slow unit of work per
//! message on a blocking worker pool, and publishes a priced [`Quote`] to
//! the `quotes` exchange.
//!
//! # Overview
//!
//! This crate provides:
//! - The processing stage itself ([`QuoteProcessor`]): cancellable blocking
//!   work plus a uniformly distributed quote value in `[0, 100)`
//! - An AMQP transport behind the [`transport::Transport`] trait
//! - A dispatch service bounding concurrent invocations with a worker pool
//! - TOML configuration with explicit channel bindings
//!
//! # Quick Start
//!
//! ```rust
//! use quote_processor::QuoteProcessor;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let processor = QuoteProcessor::new(Duration::from_millis(10));
//! let quote = processor
//!     .process("silver", &CancellationToken::new())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(quote.requested_item, "silver");
//! assert!(quote.quote_value < 100);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod processor;
pub mod quote;
pub mod service;
pub mod testing;
pub mod transport;

pub use config::{AmqpSection, ChannelsSection, ProcessorConfig, ProcessorSection};
pub use error::{ServiceError, ServiceResult};
pub use processor::{ProcessError, QuoteProcessor, DEFAULT_WORK_DURATION, QUOTE_VALUE_BOUND};
pub use quote::Quote;
pub use service::QuoteService;
pub use transport::amqp::AmqpClient;
pub use transport::{RequestMessage, Transport};
