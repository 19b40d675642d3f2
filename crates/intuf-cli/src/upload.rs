//! # Upload CLI — publish targets with their in-toto attachments.
//!
//! ```bash
//! # An artifact, its layout, the layout key and the step links:
//! intuf upload app-1.0.whl root.layout alice.pub build.link test.link
//!
//! # A layout and its keys on their own:
//! intuf upload-layout root.layout alice.pub bob.pub
//! ```
//!
//! Files are published under their paths as given, which must be relative.
//! Requires `INTUF_WRITE_TOKEN`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use intuf_core::{HashAlgorithm, TargetDescriptorBuilder};
use intuf_publish::{ArtifactBundle, LayoutBundle, PublishClient, PublishConfig, TargetBatch};

/// Options shared by the publishing subcommands.
#[derive(Args, Debug, Clone)]
pub struct PublishOptions {
    /// Target API endpoint [env: INTUF_API_URL].
    #[arg(long)]
    pub api_url: Option<Url>,

    /// Also record a SHA-512 digest for every file.
    #[arg(long)]
    pub sha512: bool,

    /// Also record a BLAKE2b-256 digest for every file.
    #[arg(long)]
    pub blake2b: bool,
}

impl PublishOptions {
    /// Environment configuration with the endpoint override applied.
    pub fn config(&self) -> Result<PublishConfig> {
        let mut config = PublishConfig::from_env().context("loading publish configuration")?;
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        Ok(config)
    }

    /// Descriptor builder for the selected digests.
    pub fn builder(&self) -> TargetDescriptorBuilder {
        let mut builder = TargetDescriptorBuilder::default();
        if self.sha512 {
            builder = builder.algorithm(HashAlgorithm::Sha512);
        }
        if self.blake2b {
            builder = builder.algorithm(HashAlgorithm::Blake2b256);
        }
        builder
    }
}

/// Upload subcommand arguments.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// The artifact to publish.
    pub target: PathBuf,

    /// The in-toto layout for the artifact.
    pub layout: PathBuf,

    /// The public key that signed the layout.
    pub key: PathBuf,

    /// Attestation links for the layout's steps.
    pub links: Vec<PathBuf>,

    #[command(flatten)]
    pub options: PublishOptions,
}

/// Upload-layout subcommand arguments.
#[derive(Args, Debug)]
pub struct UploadLayoutArgs {
    /// The in-toto layout.
    pub layout: PathBuf,

    /// Keys attached to the layout.
    #[arg(required = true)]
    pub keys: Vec<PathBuf>,

    #[command(flatten)]
    pub options: PublishOptions,
}

/// Execute the upload subcommand.
pub async fn run_upload(args: &UploadArgs) -> Result<u8> {
    let bundle = ArtifactBundle {
        target: args.target.clone(),
        layout: args.layout.clone(),
        key: args.key.clone(),
        links: args.links.clone(),
    };
    let batch = bundle
        .describe(&args.options.builder())
        .context("describing upload files")?;
    publish(&args.options, &batch).await
}

/// Execute the upload-layout subcommand.
pub async fn run_upload_layout(args: &UploadLayoutArgs) -> Result<u8> {
    let bundle = LayoutBundle {
        layout: args.layout.clone(),
        keys: args.keys.clone(),
    };
    let batch = bundle
        .describe(&args.options.builder())
        .context("describing layout files")?;
    publish(&args.options, &batch).await
}

async fn publish(options: &PublishOptions, batch: &TargetBatch) -> Result<u8> {
    let config = options.config()?;
    let credential = config.write_credential()?;
    let client = PublishClient::new(&config)?;

    let receipt = client
        .publish_batch(credential, batch)
        .await
        .with_context(|| format!("publishing to {}", config.api_url))?;

    for path in &receipt.targets {
        println!("{path}");
    }
    if let Some(task_id) = &receipt.task_id {
        tracing::info!(task_id = %task_id, "repository accepted upload");
    }
    Ok(0)
}
