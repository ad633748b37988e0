//! Cloud provider access: the [`CloudClient`] capability, its DigitalOcean
//! REST implementation, and the [`ClientFactory`] that binds a user's stored
//! token to a fresh client handle.

pub mod client;
pub mod digitalocean;
pub mod error;
pub mod factory;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod types;

pub use {
    client::CloudClient,
    digitalocean::{DigitalOceanClient, DigitalOceanConnector},
    error::{CloudError, Result},
    factory::{ClientFactory, Connector, ResolveError},
};
