use std::path::PathBuf;
use std::time::Instant;

use bindserve_core::{
    ComputeDevice, EmbeddingModel, ModalityBatch, ModalityEmbeddings, ModelInput,
};
use candle_core::{DType, Device, Tensor};

use crate::config::ImageBindConfig;
use crate::device::{DevicePreference, compute_device, select_device};
use crate::error::ModelError;
use crate::imagebind::ImageBind;
use crate::preprocess::{AudioPreprocessor, TextPreprocessor, VisionPreprocessor};
use crate::weights::{WeightsSource, var_builder};

pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Everything needed to bring the model up.
#[derive(Debug, Clone)]
pub struct EmbedderOptions {
    pub config: ImageBindConfig,
    pub weights: WeightsSource,
    pub tokenizer: PathBuf,
    pub device: DevicePreference,
    pub ordinal: usize,
    pub allow_fallback: bool,
    /// Items per forward pass within one modality.
    pub batch_size: usize,
}

/// ImageBind with its preprocessors, bound to one device.
pub struct ImageBindEmbedder {
    model: ImageBind,
    text: TextPreprocessor,
    vision: VisionPreprocessor,
    audio: AudioPreprocessor,
    batch_size: usize,
}

impl ImageBindEmbedder {
    #[tracing::instrument(skip_all, fields(device = ?options.device, tokenizer = %options.tokenizer.display()))]
    pub fn load(options: &EmbedderOptions) -> Result<Self, ModelError> {
        let start = Instant::now();
        options.config.validate()?;
        let device = select_device(options.device, options.ordinal, options.allow_fallback)?;
        tracing::info!(device = %compute_device(&device), "Selected compute device");

        let text = TextPreprocessor::from_file(&options.tokenizer, options.config.text.context_length)?;
        let weights = options.weights.resolve()?;
        tracing::info!(weights = %weights.display(), "Loading checkpoint");
        let vb = var_builder(&weights, DType::F32, &device)?;
        let model = ImageBind::load(vb, &options.config)?;

        tracing::info!(
            out_dim = options.config.out_embed_dim,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ImageBind loaded"
        );
        Ok(Self::from_parts(model, text, options.batch_size))
    }

    pub fn from_parts(model: ImageBind, text: TextPreprocessor, batch_size: usize) -> Self {
        let config = model.config();
        Self {
            vision: VisionPreprocessor::new(&config.vision),
            audio: AudioPreprocessor::new(&config.audio),
            text,
            model,
            batch_size: batch_size.max(1),
        }
    }

    pub fn model(&self) -> &ImageBind {
        &self.model
    }

    fn candle_device(&self) -> &Device {
        self.model.device()
    }

    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let tokens = self.text.encode_batch(chunk, self.candle_device())?;
            let embeddings = self.model.forward_text(&tokens.ids, &tokens.eos_positions)?;
            out.extend(rows(&embeddings, chunk.len())?);
        }
        Ok(out)
    }

    pub fn embed_images(&self, images: &[Vec<u8>]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut out = Vec::with_capacity(images.len());
        for (n, chunk) in images.chunks(self.batch_size).enumerate() {
            let pixels = self
                .vision
                .process_batch(chunk, self.candle_device())
                .map_err(|e| offset_index(e, n * self.batch_size))?;
            let embeddings = self.model.forward_vision(&pixels)?;
            out.extend(rows(&embeddings, chunk.len())?);
        }
        Ok(out)
    }

    pub fn embed_audio(&self, clips: &[Vec<u8>]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut out = Vec::with_capacity(clips.len());
        for (n, chunk) in clips.chunks(self.batch_size).enumerate() {
            let mels = self
                .audio
                .process_batch(chunk, self.candle_device())
                .map_err(|e| offset_index(e, n * self.batch_size))?;
            let embeddings = self.model.forward_audio(&mels)?;
            out.extend(rows(&embeddings, chunk.len())?);
        }
        Ok(out)
    }
}

/// Chunk-local decode positions to request positions.
fn offset_index(error: ModelError, offset: usize) -> ModelError {
    match error {
        ModelError::Decode {
            modality,
            index,
            message,
        } => ModelError::Decode {
            modality,
            index: index + offset,
            message,
        },
        other => other,
    }
}

fn rows(embeddings: &Tensor, expected: usize) -> Result<Vec<Vec<f32>>, ModelError> {
    let rows = embeddings.to_dtype(DType::F32)?.to_vec2::<f32>()?;
    if rows.len() != expected {
        return Err(ModelError::Dimension(format!(
            "expected {expected} embeddings, got {}",
            rows.len()
        )));
    }
    Ok(rows)
}

impl EmbeddingModel for ImageBindEmbedder {
    fn embed(&self, input: &ModelInput) -> bindserve_error::Result<ModalityEmbeddings> {
        let mut out = ModalityEmbeddings::new();
        // One modality at a time; its tensors are dropped before the next runs
        for batch in input.batches() {
            let vectors = match batch {
                ModalityBatch::Text(texts) => self.embed_texts(texts)?,
                ModalityBatch::Vision(images) => self.embed_images(images)?,
                ModalityBatch::Audio(clips) => self.embed_audio(clips)?,
            };
            tracing::debug!(modality = %batch.modality(), items = vectors.len(), "embedded batch");
            out.insert(batch.modality(), vectors);
        }
        Ok(out)
    }

    fn embedding_dim(&self) -> usize {
        self.model.config().out_embed_dim
    }

    fn device(&self) -> ComputeDevice {
        compute_device(self.model.device())
    }
}

impl std::fmt::Debug for ImageBindEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBindEmbedder")
            .field("device", &compute_device(self.model.device()))
            .field("out_dim", &self.model.config().out_embed_dim)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindserve_core::Modality;

    #[test]
    fn chunk_offsets_apply_to_decode_errors_only() {
        let err = ModelError::Decode {
            modality: Modality::Vision,
            index: 1,
            message: "bad".into(),
        };
        assert!(matches!(offset_index(err, 8), ModelError::Decode { index: 9, .. }));
        let err = offset_index(ModelError::Config("x".into()), 8);
        assert!(matches!(err, ModelError::Config(_)));
    }
}
