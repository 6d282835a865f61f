/// Typed, lazily populated object model for the Linode LKE and profile APIs
pub mod base;
pub mod client;
pub mod config;
pub mod error;
pub mod keygen;
pub mod objects;
pub mod utils;

pub use base::{Property, PropertyValue, Resource, ResourceId, ResourceKind};
pub use client::LinodeClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use objects::*;
