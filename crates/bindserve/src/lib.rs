//! Serving shim for ImageBind embeddings.
//!
//! A host calls [`loader::load`] once at startup with its [`HostContext`],
//! wraps the handle in a [`Predictor`], and forwards each request's
//! `model_input` JSON to [`Predictor::predict`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use bindserve::{HostContext, Predictor, ServeConfig, loader};
//!
//! # fn main() -> bindserve_error::Result<()> {
//! let config = ServeConfig::load(None)?;
//! let ctx = HostContext::new("/app/data").with_config(config);
//! let handle = Arc::new(loader::load(&ctx)?);
//! let predictor = Predictor::new(handle, ctx.config.variant);
//! let out = predictor.predict(serde_json::json!({"text": ["a cat"]}))?;
//! # let _ = out;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod loader;
pub mod predictor;
pub mod tracing_setup;

pub use config::{DeviceConfig, HostContext, LoggingConfig, Secrets, ServeConfig, Variant, WeightsConfig};
pub use predictor::{Predictor, predict_legacy, predict_serializable};
