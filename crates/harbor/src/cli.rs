use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use harbor_fetch::{PrefixMirror, ReqwestClient};
use harbor_session::{ConfigHandle, EngineConfig, Orchestrator, SessionOptions};
use harbor_verify::{Algorithm, ContentHash, digest_file, file_matches};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::plan::PlanResolver;
use crate::ui::SessionProgress;

#[derive(Debug, Parser)]
#[command(name = "harbor", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "r", name = "run", about = "Install the version described by a plan file")]
    Run(RunArgs),
    #[command(name = "hash", about = "Print or check the digest of a local file")]
    Hash(HashArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// JSON plan listing manifest, core and asset files.
    plan: PathBuf,

    /// TOML engine configuration.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the concurrent download limit.
    #[arg(long, short)]
    jobs: Option<usize>,

    /// Rewrite URLs starting with FROM to start with TO instead.
    #[arg(long = "mirror", value_name = "FROM=TO", value_parser = parse_mirror)]
    mirrors: Vec<(String, String)>,

    /// Directory relative plan paths resolve against. Defaults to the plan's
    /// directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Do not draw a progress bar.
    #[arg(long, short)]
    quiet: bool,
}

fn parse_mirror(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok((from.to_string(), to.to_string())),
        _ => Err(format!("expected FROM=TO, got '{s}'")),
    }
}

impl RunArgs {
    pub async fn run(self) -> anyhow::Result<bool> {
        let mut config = EngineConfig::load(self.config.as_deref()).context("cannot load configuration")?;
        if let Some(jobs) = self.jobs {
            config.max_concurrent_downloads = jobs;
            config.validate()?;
        }

        let root = match self.root {
            Some(root) => root,
            None => self
                .plan
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default(),
        };
        let resolver = PlanResolver::load(&self.plan, root).await?;
        let version = resolver.version().to_string();

        let mirror = self
            .mirrors
            .into_iter()
            .fold(PrefixMirror::new(), |mirror, (from, to)| mirror.rule(from, to));
        let client = ReqwestClient::with_timeout(config.download_timeout())?;
        let orchestrator = Orchestrator::builder(client, resolver)
            .config(ConfigHandle::new(config))
            .rewriter(mirror)
            .build()?;

        let progress = SessionProgress::spawn(orchestrator.subscribe(), &version, !self.quiet);

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, cancelling downloads");
                    cancel.cancel();
                }
            })
        };

        let result = orchestrator
            .start_session(&version, SessionOptions::default().cancel_token(cancel))
            .await;
        interrupt.abort();
        drop(orchestrator);

        if let Some(report) = progress.finish().await {
            for unit in &report.failed {
                eprintln!(
                    "failed: {} ({})",
                    unit.url,
                    unit.last_error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Ok(result?)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl From<HashAlgorithm> for Algorithm {
    fn from(value: HashAlgorithm) -> Self {
        match value {
            HashAlgorithm::Sha1 => Algorithm::Sha1,
            HashAlgorithm::Sha256 => Algorithm::Sha256,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct HashArgs {
    file: PathBuf,

    #[arg(long, short, value_enum, default_value_t = HashAlgorithm::Sha1)]
    algorithm: HashAlgorithm,

    /// Exit non-zero unless the file matches this hex digest.
    #[arg(long)]
    expect: Option<String>,
}

impl HashArgs {
    pub async fn run(self) -> anyhow::Result<bool> {
        if let Some(expected) = self.expect {
            let expected: ContentHash = expected.parse()?;
            let matches = file_matches(&self.file, &expected).await?;
            println!("{}: {}", self.file.display(), if matches { "OK" } else { "MISMATCH" });
            return Ok(matches);
        }

        let digest = digest_file(&self.file, self.algorithm.into())
            .await
            .with_context(|| format!("cannot read {}", self.file.display()))?;
        println!("{}  {}", hex::encode(digest), self.file.display());
        Ok(true)
    }
}
