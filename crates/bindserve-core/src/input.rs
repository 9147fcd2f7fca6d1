use std::collections::BTreeMap;

use crate::Modality;

/// The items submitted for a single modality.
///
/// Vision and audio payloads are already base64-decoded; their bytes are the
/// raw file contents (an image container, a WAV file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalityBatch {
    Text(Vec<String>),
    Vision(Vec<Vec<u8>>),
    Audio(Vec<Vec<u8>>),
}

impl ModalityBatch {
    pub fn modality(&self) -> Modality {
        match self {
            ModalityBatch::Text(_) => Modality::Text,
            ModalityBatch::Vision(_) => Modality::Vision,
            ModalityBatch::Audio(_) => Modality::Audio,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ModalityBatch::Text(items) => items.len(),
            ModalityBatch::Vision(items) | ModalityBatch::Audio(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A validated request: at most one batch per modality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInput {
    batches: BTreeMap<Modality, ModalityBatch>,
}

impl ModelInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_batch(ModalityBatch::Text(texts.into_iter().map(Into::into).collect()))
    }

    /// Builder-style insert; replaces any batch already present for the modality.
    pub fn with_batch(mut self, batch: ModalityBatch) -> Self {
        self.insert(batch);
        self
    }

    pub fn insert(&mut self, batch: ModalityBatch) -> Option<ModalityBatch> {
        self.batches.insert(batch.modality(), batch)
    }

    pub fn get(&self, modality: Modality) -> Option<&ModalityBatch> {
        self.batches.get(&modality)
    }

    pub fn texts(&self) -> Option<&[String]> {
        match self.batches.get(&Modality::Text) {
            Some(ModalityBatch::Text(items)) => Some(items),
            _ => None,
        }
    }

    pub fn images(&self) -> Option<&[Vec<u8>]> {
        match self.batches.get(&Modality::Vision) {
            Some(ModalityBatch::Vision(items)) => Some(items),
            _ => None,
        }
    }

    pub fn audio_clips(&self) -> Option<&[Vec<u8>]> {
        match self.batches.get(&Modality::Audio) {
            Some(ModalityBatch::Audio(items)) => Some(items),
            _ => None,
        }
    }

    /// Modalities present in the request, in canonical order.
    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.batches.keys().copied()
    }

    pub fn batches(&self) -> impl Iterator<Item = &ModalityBatch> {
        self.batches.values()
    }

    /// Number of modalities present.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total items across every modality.
    pub fn item_count(&self) -> usize {
        self.batches.values().map(ModalityBatch::len).sum()
    }

    /// Split off modalities whose batch is empty.
    ///
    /// Returns the input that still needs a model call together with the
    /// modalities that were present but had nothing to embed.
    pub fn split_empty(self) -> (ModelInput, Vec<Modality>) {
        let mut empty = Vec::new();
        let mut batches = BTreeMap::new();
        for (modality, batch) in self.batches {
            if batch.is_empty() {
                empty.push(modality);
            } else {
                batches.insert(modality, batch);
            }
        }
        (ModelInput { batches }, empty)
    }
}
