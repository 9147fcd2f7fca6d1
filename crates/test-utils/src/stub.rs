use std::sync::atomic::{AtomicUsize, Ordering};

use bindserve_core::{
    ComputeDevice, Embedding, EmbeddingModel, ModalityBatch, ModalityEmbeddings, ModelInput,
};
use bindserve_error::{InferenceError, Result};

/// Deterministic stand-in for a real model.
///
/// Each vector is unit length and depends only on the modality and the item's
/// content, so tests can compare outputs across calls.
#[derive(Debug)]
pub struct StubModel {
    dim: usize,
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl StubModel {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// Every `embed` call fails with a tensor error carrying `message`.
    pub fn failing(dim: usize, message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new(dim)
        }
    }

    /// Number of times `embed` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, seed: u64) -> Embedding {
        let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
        let mut v: Vec<f32> = (0..self.dim)
            .map(|_| {
                // xorshift64
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state % 2001) as f32 / 1000.0 - 1.0
            })
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(*b)).wrapping_mul(0x100_0000_01b3)
    })
}

impl EmbeddingModel for StubModel {
    fn embed(&self, input: &ModelInput) -> Result<ModalityEmbeddings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(InferenceError::Tensor(message.clone()).into());
        }
        let mut out = ModalityEmbeddings::new();
        for batch in input.batches() {
            let tag = batch.modality().as_str().as_bytes();
            let seeds: Vec<u64> = match batch {
                ModalityBatch::Text(items) => items.iter().map(|s| fnv1a(s.as_bytes())).collect(),
                ModalityBatch::Vision(items) | ModalityBatch::Audio(items) => {
                    items.iter().map(|b| fnv1a(b)).collect()
                }
            };
            let vectors = seeds
                .into_iter()
                .map(|seed| self.vector(seed ^ fnv1a(tag)))
                .collect();
            out.insert(batch.modality(), vectors);
        }
        Ok(out)
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindserve_core::Modality;

    #[test]
    fn vectors_are_deterministic_and_unit_length() {
        let stub = StubModel::new(16);
        let input = ModelInput::from_texts(["a cat", "a dog"]);
        let first = stub.embed(&input).unwrap();
        let second = stub.embed(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(stub.calls(), 2);

        let text = first.get(Modality::Text).unwrap();
        assert_ne!(text[0], text[1]);
        for v in text {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }
}
