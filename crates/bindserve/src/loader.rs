use bindserve_core::ModelHandle;
use bindserve_error::{Error, FatalError, Result};
use bindserve_model::ImageBindEmbedder;
use tracing::{info, instrument};

use crate::config::HostContext;

/// Build the ImageBind embedder described by `ctx`.
///
/// Called once per process. Every failure is [`Error::Fatal`]; the host should
/// not start serving.
#[instrument(skip_all, fields(data_dir = %ctx.data_dir.display(), variant = ?ctx.config.variant))]
pub fn load(ctx: &HostContext) -> Result<ModelHandle<ImageBindEmbedder>> {
    if !ctx.data_dir.is_dir() {
        return Err(FatalError::MissingFile {
            what: "data directory",
            path: ctx.data_dir.clone(),
        }
        .into());
    }
    ctx.config.validate()?;

    let options = ctx.embedder_options();
    let handle = ModelHandle::timed(|| ImageBindEmbedder::load(&options))
        .map_err(|e| Error::Fatal(e.into_fatal()))?;

    info!(
        device = %handle.device(),
        embedding_dim = handle.embedding_dim(),
        load_ms = handle.load_time().as_millis() as u64,
        "Model ready"
    );
    Ok(handle)
}
