//! # Delete CLI — retract targets from the index.
//!
//! ```bash
//! intuf delete app-1.0.whl root.layout alice.pub
//! ```
//!
//! Requires `INTUF_DELETE_TOKEN`. A target the repository does not know
//! fails the whole request with the server's response.

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use intuf_core::TargetPath;
use intuf_publish::{PublishClient, PublishConfig};

/// Delete subcommand arguments.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Target names to remove.
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Target API endpoint [env: INTUF_API_URL].
    #[arg(long)]
    pub api_url: Option<Url>,
}

/// Execute the delete subcommand.
pub async fn run_delete(args: &DeleteArgs) -> Result<u8> {
    let paths = args
        .targets
        .iter()
        .map(|t| TargetPath::new(t.as_str()).with_context(|| format!("invalid target name '{t}'")))
        .collect::<Result<Vec<_>>>()?;

    let mut config = PublishConfig::from_env().context("loading publish configuration")?;
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    let credential = config.delete_credential()?;
    let client = PublishClient::new(&config)?;

    let receipt = client
        .retract(credential, &paths)
        .await
        .with_context(|| format!("deleting from {}", config.api_url))?;

    for path in &receipt.targets {
        println!("{path}");
    }
    if let Some(task_id) = &receipt.task_id {
        tracing::info!(task_id = %task_id, "repository accepted deletion");
    }
    Ok(0)
}
