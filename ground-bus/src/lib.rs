//! Durable AMQP topic exchange topology and publish/consume helpers.
pub mod client;
pub mod topology;

pub use client::BusClient;
