//! Shared wire codec, data model and config types for the ground segment core.
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod retry;
pub mod wire;

pub use codec::{encrypt_frame, decrypt_frame, KeyRing};
pub use error::CoreError;
pub use wire::FrameView;
