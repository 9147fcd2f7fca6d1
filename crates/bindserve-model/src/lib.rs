//! ImageBind (huge) on candle, behind the [`bindserve_core::EmbeddingModel`]
//! trait.
//!
//! [`ImageBindEmbedder::load`] selects a device, resolves the checkpoint,
//! loads the CLIP tokenizer and builds the network. Requests then flow through
//! the per-modality preprocessors in [`preprocess`] and the towers in
//! [`ImageBind`].
pub mod config;
pub mod device;
pub mod embedder;
pub mod error;
pub mod imagebind;
pub mod nn;
pub mod preprocess;
pub mod weights;

pub use config::{AudioConfig, ImageBindConfig, TextConfig, TrunkConfig, VisionConfig};
pub use device::{DevicePreference, compute_device, select_device};
pub use embedder::{DEFAULT_BATCH_SIZE, EmbedderOptions, ImageBindEmbedder};
pub use error::ModelError;
pub use imagebind::ImageBind;
pub use weights::{DEFAULT_CHECKPOINT, WeightsSource, var_builder};
