//! # Download CLI — fetch, verify and install one target.
//!
//! ```bash
//! # Verify against the layout and keys attached to the target:
//! intuf download app-1.0.whl --dest ./dist
//!
//! # Verify against an explicit layout and key:
//! intuf download app-1.0.whl --layout root.layout --layout-key alice.pub
//!
//! # Install without provenance verification (always reported on stderr):
//! intuf download app-1.0.whl --skip-in-toto-verify
//! ```
//!
//! Root metadata must already be in the metadata directory; the error
//! message names the path when it is missing.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use url::Url;

use intuf_core::{MetadataDirectory, TargetPath};
use intuf_fetch::{
    DownloadRequest, Downloader, HttpMetadataClient, InTotoVerifier, RepositoryConfig,
    VerificationPlan, VerificationPolicy,
};

/// Download subcommand arguments.
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Target name in the repository index.
    pub target: String,

    /// Directory the verified target is installed into.
    #[arg(long, default_value = ".")]
    pub dest: PathBuf,

    /// Install without running the in-toto verifier.
    #[arg(long)]
    pub skip_in_toto_verify: bool,

    /// Layout to verify against instead of the one derived from attachments.
    #[arg(long, requires = "layout_keys")]
    pub layout: Option<String>,

    /// Key for the explicit layout. Repeatable.
    #[arg(long = "layout-key", requires = "layout")]
    pub layout_keys: Vec<String>,

    /// Metadata server base URL [env: INTUF_METADATA_URL].
    #[arg(long)]
    pub metadata_url: Option<Url>,

    /// Target server base URL [env: INTUF_TARGET_URL].
    #[arg(long)]
    pub target_url: Option<Url>,

    /// Metadata directory holding root.json. Defaults to a per-repository
    /// directory under the user data directory.
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    /// Verifier executable [env: INTUF_VERIFIER].
    #[arg(long)]
    pub verifier: Option<String>,
}

impl DownloadArgs {
    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> Result<RepositoryConfig> {
        let mut config = RepositoryConfig::from_env().context("loading repository configuration")?;
        if let Some(url) = &self.metadata_url {
            config.metadata_url = intuf_fetch::config::directory_url(url.clone());
        }
        if let Some(url) = &self.target_url {
            config.target_url = intuf_fetch::config::directory_url(url.clone());
        }
        if let Some(program) = &self.verifier {
            config.verifier_program = program.clone();
        }
        Ok(config)
    }

    /// The download request these arguments describe.
    pub fn request(&self) -> Result<DownloadRequest> {
        let target = TargetPath::new(self.target.as_str())
            .with_context(|| format!("invalid target name '{}'", self.target))?;
        let mut request = DownloadRequest::new(target, &self.dest)
            .policy(VerificationPolicy::from_skip_flag(self.skip_in_toto_verify));

        if let Some(layout) = &self.layout {
            if self.layout_keys.is_empty() {
                bail!("--layout requires at least one --layout-key");
            }
            let layout = TargetPath::new(layout.as_str())
                .with_context(|| format!("invalid layout name '{layout}'"))?;
            let keys = self
                .layout_keys
                .iter()
                .map(|k| {
                    TargetPath::new(k.as_str()).with_context(|| format!("invalid key name '{k}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            request = request.plan(VerificationPlan::new(layout, keys));
        }
        Ok(request)
    }
}

/// Report a verification bypass on `out`.
///
/// Written regardless of the log filter, so `--skip-in-toto-verify` is
/// never silent.
pub fn report_skip(request: &DownloadRequest, out: &mut impl Write) -> std::io::Result<()> {
    if request.policy == VerificationPolicy::Skip {
        writeln!(
            out,
            "warning: in-toto verification skipped; {} will be installed without provenance checks",
            request.target
        )?;
    }
    Ok(())
}

/// Execute the download subcommand.
pub async fn run_download(args: &DownloadArgs) -> Result<u8> {
    let config = args.config()?;
    let request = args.request()?;
    report_skip(&request, &mut std::io::stderr()).context("writing to stderr")?;

    let metadata_dir = match &args.metadata_dir {
        Some(dir) => MetadataDirectory::at(dir),
        None => config
            .metadata_dir()
            .context("locating the metadata directory")?,
    };
    tracing::debug!(metadata_dir = %metadata_dir.path().display(), "using metadata directory");

    let client = HttpMetadataClient::new(&config, metadata_dir.clone())
        .context("creating metadata client")?;
    let verifier = InTotoVerifier::new(&config.verifier_program);
    let downloader = Downloader::new(client, verifier, metadata_dir);

    let outcome = downloader
        .download(request)
        .await
        .with_context(|| format!("downloading {}", args.target))?;

    println!("{}", outcome.installed.display());
    tracing::info!(
        resolved = outcome.resolved.len(),
        downloads = outcome.downloads,
        cache_hits = outcome.cache_hits,
        verified = outcome.verified,
        "download complete"
    );
    Ok(0)
}
