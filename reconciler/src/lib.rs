//! Elevo Workspace Reconciler
//!
//! Turns workspace records into the Kubernetes manifests a remote agent
//! applies, and assembles the reconciliation response payload.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod service;


pub use config::Config;
pub use error::{Error, Result};
