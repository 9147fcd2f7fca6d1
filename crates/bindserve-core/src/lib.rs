//! Core data types shared by the bindserve crates.
//!
//! Requests arrive as loosely typed JSON; [`validate`] turns them into a
//! [`ModelInput`] keyed by [`Modality`], and models answer with
//! [`ModalityEmbeddings`]. Nothing in this crate touches tensors.
pub mod device;
pub mod embeddings;
pub mod input;
pub mod modality;
pub mod model;
pub mod validate;

pub use device::ComputeDevice;
pub use embeddings::{Embedding, ModalityEmbeddings};
pub use input::{ModalityBatch, ModelInput};
pub use modality::Modality;
pub use model::{EmbeddingModel, ModelHandle};
pub use validate::{decode_base64, is_valid_base64, validate, validate_legacy};

/// Width of every ImageBind embedding, regardless of modality.
pub const EMBEDDING_DIM: usize = 1024;
