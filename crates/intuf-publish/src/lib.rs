//! # intuf-publish — Target Publication
//!
//! Registers artifacts and their in-toto attachments in a repository's
//! target index, and removes them again, through the repository's
//! authorized target API.
//!
//! - [`batch`] builds descriptor batches from local files, wiring each
//!   target's attachment list.
//! - [`client`] sends one batch per request under a scoped credential.
//! - [`config`] loads the endpoint and tokens from the environment.
//!
//! Publication needs a [`WriteCredential`](intuf_core::WriteCredential);
//! retraction needs a [`DeleteCredential`](intuf_core::DeleteCredential).
//! The two are distinct types.

pub mod batch;
pub mod client;
pub mod config;
pub mod error;

pub use batch::{ArtifactBundle, LayoutBundle, TargetBatch};
pub use client::{PublishClient, Receipt};
pub use config::{ConfigError, PublishConfig};
pub use error::PublishError;
