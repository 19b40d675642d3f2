//! # intuf-fetch — Attestation-Gated Retrieval
//!
//! Fetches a target from a TUF-backed repository together with every
//! attachment its provenance verification needs, runs the in-toto verifier
//! over the staged set, and installs the target only if verification passes.
//!
//! ## Flow
//!
//! ```text
//! MetadataDirectory::require_trust_root
//!   -> MetadataClient::refresh
//!   -> resolve_and_fetch (depth-first, each target once, cycles rejected)
//!   -> VerificationGate::admit (verify, then move exactly the target)
//! ```
//!
//! The metadata protocol sits behind the [`MetadataClient`] trait.
//! [`HttpMetadataClient`] talks to a repository over HTTP;
//! [`InMemoryMetadataClient`] serves a fixed set of targets.
//!
//! ## Failure Model
//!
//! Fail closed: after any error or rejection the destination directory
//! holds nothing new, and the working directory is removed. Client errors
//! are terminal; nothing is retried.

pub mod config;
pub mod download;
pub mod error;
pub mod gate;
pub mod http;
pub mod memory;
pub mod metadata;
pub mod resolver;
pub mod verifier;
pub mod workdir;

pub use config::{ConfigError, RepositoryConfig};
pub use download::{DownloadOutcome, DownloadRequest, Downloader};
pub use error::{FetchError, MetadataError, PlanError};
pub use gate::{Admission, Installed, VerificationGate, VerificationPlan, VerificationPolicy};
pub use http::HttpMetadataClient;
pub use memory::InMemoryMetadataClient;
pub use metadata::MetadataClient;
pub use resolver::{resolve_and_fetch, ResolutionSession, ResolvedSet, ResolvedTarget};
pub use verifier::{InTotoVerifier, Verdict, Verifier};
pub use workdir::WorkingDirectory;
