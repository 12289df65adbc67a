use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use harbor_verify::ContentHash;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// The three install phases, in the order a session runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Manifest,
    Core,
    Assets,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Manifest => "manifest",
            Phase::Core => "core",
            Phase::Assets => "assets",
        })
    }
}

/// One file to place on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub url:          String,
    #[serde(default)]
    pub fallback_url: Option<String>,
    pub path:         PathBuf,
    #[serde(default)]
    pub hash:         Option<ContentHash>,
    #[serde(default)]
    pub size:         Option<u64>,
}

impl FileSpec {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url:          url.into(),
            fallback_url: None,
            path:         path.into(),
            hash:         None,
            size:         None,
        }
    }

    pub fn fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Source of the file lists for each phase of a version install.
///
/// Only [`manifest_files`](Self::manifest_files) may be called before the
/// manifest phase has completed; the descriptor it leads to is parsed from the
/// files that phase placed on disk.
pub trait MetadataResolver: Send + Sync + 'static {
    /// Parsed version metadata handed to the later phases.
    type Descriptor: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn manifest_files(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<Vec<FileSpec>, Self::Error>> + Send;

    fn load_descriptor(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<Self::Descriptor, Self::Error>> + Send;

    fn core_files(
        &self,
        descriptor: &Self::Descriptor,
        platform: &Platform,
    ) -> impl Future<Output = Result<Vec<FileSpec>, Self::Error>> + Send;

    fn asset_files(
        &self,
        descriptor: &Self::Descriptor,
    ) -> impl Future<Output = Result<Vec<FileSpec>, Self::Error>> + Send;
}
