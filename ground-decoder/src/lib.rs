//! Schema-driven binary telemetry decoder runtime.
pub mod registry;
pub mod runtime;
pub mod schema;
pub mod schemas;

pub use registry::SchemaRegistry;
pub use runtime::{decode, decode_hex};
pub use schema::PacketSchema;
