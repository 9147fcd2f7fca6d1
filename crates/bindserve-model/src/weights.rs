//! Locating the checkpoint and opening a `VarBuilder` over it.
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};

use crate::error::ModelError;

pub const DEFAULT_CHECKPOINT: &str = ".checkpoints/imagebind_huge.pth";

/// Where the pretrained weights come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    Local(PathBuf),
    Hub {
        repo: String,
        revision: Option<String>,
        filename: String,
        token: Option<String>,
    },
}

impl WeightsSource {
    /// Resolve to a file on disk, downloading into the hub cache if needed.
    pub fn resolve(&self) -> Result<PathBuf, ModelError> {
        match self {
            WeightsSource::Local(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(ModelError::MissingFile {
                        what: "weights",
                        path: path.clone(),
                    })
                }
            }
            WeightsSource::Hub {
                repo,
                revision,
                filename,
                token,
            } => {
                let download_err = |source| ModelError::ModelDownload {
                    repo: repo.clone(),
                    filename: filename.clone(),
                    source,
                };
                let api = ApiBuilder::new()
                    .with_token(token.clone())
                    .build()
                    .map_err(download_err)?;
                let repo_ref = match revision {
                    Some(rev) => Repo::with_revision(repo.clone(), RepoType::Model, rev.clone()),
                    None => Repo::new(repo.clone(), RepoType::Model),
                };
                tracing::info!(%repo, %filename, "Fetching weights from the hub");
                api.repo(repo_ref).get(filename).map_err(download_err)
            }
        }
    }
}

/// Open a checkpoint: `.safetensors` is memory-mapped, anything else is read
/// as a PyTorch pickle.
pub fn var_builder(path: &Path, dtype: DType, device: &Device) -> Result<VarBuilder<'static>, ModelError> {
    let is_safetensors = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("safetensors"));
    let vb = if is_safetensors {
        // SAFETY: the checkpoint is not modified while the process runs
        unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, device)? }
    } else {
        VarBuilder::from_pth(path, dtype, device)?
    };
    Ok(vb)
}
