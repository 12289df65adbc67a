use std::path::{Path, PathBuf};

use harbor_session::{Arch, FileSpec, MetadataResolver, Os, Platform};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot read plan {}: {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed plan: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("plan describes version '{available}', not '{requested}'")]
    UnknownVersion { requested: String, available: String },
}

/// A version install written out as JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub version:  String,
    #[serde(default)]
    pub manifest: Vec<FileSpec>,
    #[serde(default)]
    pub core:     Vec<CoreFile>,
    #[serde(default)]
    pub assets:   Vec<FileSpec>,
}

/// Core file, optionally restricted to one platform.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreFile {
    #[serde(flatten)]
    pub file: FileSpec,
    #[serde(default)]
    pub os:   Option<Os>,
    #[serde(default)]
    pub arch: Option<Arch>,
}

impl CoreFile {
    fn applies_to(&self, platform: &Platform) -> bool {
        self.os.is_none_or(|os| os == platform.os) && self.arch.is_none_or(|arch| arch == platform.arch)
    }
}

/// Serves every phase from a single plan file.
pub struct PlanResolver {
    plan: Plan,
    root: PathBuf,
}

impl PlanResolver {
    pub async fn load(path: &Path, root: PathBuf) -> Result<Self, PlanError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(serde_json::from_str(&raw)?, root))
    }

    pub fn new(plan: Plan, root: PathBuf) -> Self { Self { plan, root } }

    pub fn version(&self) -> &str { &self.plan.version }

    fn anchor(&self, mut file: FileSpec) -> FileSpec {
        if file.path.is_relative() {
            file.path = self.root.join(&file.path);
        }
        file
    }

    fn anchor_all<'a>(&self, files: impl IntoIterator<Item = &'a FileSpec>) -> Vec<FileSpec> {
        files.into_iter().map(|f| self.anchor(f.clone())).collect()
    }
}

impl MetadataResolver for PlanResolver {
    type Descriptor = Plan;
    type Error = PlanError;

    async fn manifest_files(&self, version: &str) -> Result<Vec<FileSpec>, PlanError> {
        if version != self.plan.version {
            return Err(PlanError::UnknownVersion {
                requested: version.to_string(),
                available: self.plan.version.clone(),
            });
        }
        Ok(self.anchor_all(&self.plan.manifest))
    }

    async fn load_descriptor(&self, _version: &str) -> Result<Plan, PlanError> { Ok(self.plan.clone()) }

    async fn core_files(&self, plan: &Plan, platform: &Platform) -> Result<Vec<FileSpec>, PlanError> {
        Ok(self.anchor_all(plan.core.iter().filter(|c| c.applies_to(platform)).map(|c| &c.file)))
    }

    async fn asset_files(&self, plan: &Plan) -> Result<Vec<FileSpec>, PlanError> { Ok(self.anchor_all(&plan.assets)) }
}
