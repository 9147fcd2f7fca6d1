use std::path::Path;

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use crate::error::ModelError;

/// CLIP-style text tokenization with a fixed context window.
pub struct TextPreprocessor {
    tokenizer: Tokenizer,
    context_length: usize,
}

/// Token ids for a batch plus the pooled (end-of-text) position of each row.
#[derive(Debug)]
pub struct TokenBatch {
    pub ids: Tensor,
    pub eos_positions: Vec<u32>,
}

impl TextPreprocessor {
    pub fn from_file(path: &Path, context_length: usize) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::MissingFile {
                what: "tokenizer",
                path: path.to_path_buf(),
            });
        }
        let tokenizer = Tokenizer::from_file(path).map_err(|e| ModelError::TokenizerFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::new(tokenizer, context_length)
    }

    /// Padding and truncation are done here, not by the tokenizer, so the
    /// pooled position can be found on the unpadded ids.
    pub fn new(mut tokenizer: Tokenizer, context_length: usize) -> Result<Self, ModelError> {
        tokenizer.with_padding(None);
        tokenizer.with_truncation(None)?;
        Ok(Self {
            tokenizer,
            context_length,
        })
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Encode one string to exactly `context_length` ids, zero padded.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError> {
        let encoding = self.tokenizer.encode(text, true)?;
        let mut ids: Vec<u32> = encoding
            .get_ids()
            .iter()
            .copied()
            .take(self.context_length)
            .collect();
        ids.resize(self.context_length, 0);
        Ok(ids)
    }

    pub fn encode_batch(&self, texts: &[String], device: &Device) -> Result<TokenBatch, ModelError> {
        let mut flat = Vec::with_capacity(texts.len() * self.context_length);
        let mut eos_positions = Vec::with_capacity(texts.len());
        for text in texts {
            let ids = self.encode(text)?;
            eos_positions.push(argmax_first(&ids));
            flat.extend(ids);
        }
        let ids = Tensor::from_vec(flat, (texts.len(), self.context_length), device)?;
        Ok(TokenBatch { ids, eos_positions })
    }
}

/// Index of the largest id; the end-of-text token has the highest id in the
/// CLIP vocabulary. Ties resolve to the first occurrence.
fn argmax_first(ids: &[u32]) -> u32 {
    let mut best = 0usize;
    for (i, id) in ids.iter().enumerate() {
        if *id > ids[best] {
            best = i;
        }
    }
    best as u32
}
