//! In-process publish/subscribe topic registry.
//!
//! Topics are named channels inside a namespace. Each topic has a stable
//! 32-bit identifier (CRC-32 of `namespace/name`) and a maximum payload size.
//! Subscribers register callbacks that run synchronously inside `publish`,
//! on whatever execution context the publisher is in.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod registry;

pub use config::RegistryConfig;
pub use descriptor::{topic_identifier, TopicDescriptor, DEFAULT_NAMESPACE};
pub use error::{Result, TopicError};
pub use registry::{CallContext, CallbackHandle, TopicCallback, TopicRegistry};
