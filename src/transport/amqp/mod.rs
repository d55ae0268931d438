//! AMQP (RabbitMQ) transport implementation.
//!
//! Split the same way as the rest of the transport layer: pure connection
//! and payload handling helpers live in [`connection`] and
//! [`message_handler`]; the impure broker I/O lives in [`client`].

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::AmqpClient;
pub use connection::AmqpError;
