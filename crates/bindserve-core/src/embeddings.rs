use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Modality;

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Model output: one ordered list of vectors per requested modality.
///
/// Serialises as a plain JSON object, e.g. `{"text": [[0.1, ...]]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModalityEmbeddings(BTreeMap<Modality, Vec<Embedding>>);

impl ModalityEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, modality: Modality, vectors: Vec<Embedding>) -> Option<Vec<Embedding>> {
        self.0.insert(modality, vectors)
    }

    pub fn get(&self, modality: Modality) -> Option<&[Embedding]> {
        self.0.get(&modality).map(Vec::as_slice)
    }

    pub fn remove(&mut self, modality: Modality) -> Option<Vec<Embedding>> {
        self.0.remove(&modality)
    }

    pub fn contains(&self, modality: Modality) -> bool {
        self.0.contains_key(&modality)
    }

    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Modality, &[Embedding])> {
        self.0.iter().map(|(m, v)| (*m, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<Modality, Vec<Embedding>> {
        self.0
    }
}

impl FromIterator<(Modality, Vec<Embedding>)> for ModalityEmbeddings {
    fn from_iter<T: IntoIterator<Item = (Modality, Vec<Embedding>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialises_as_plain_object() {
        let out: ModalityEmbeddings = [
            (Modality::Vision, vec![vec![0.5, 0.25]]),
            (Modality::Text, vec![vec![1.0], vec![-1.0]]),
        ]
        .into_iter()
        .collect();
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value, json!({"text": [[1.0], [-1.0]], "vision": [[0.5, 0.25]]}));

        let back: ModalityEmbeddings = serde_json::from_value(value).unwrap();
        assert_eq!(back, out);
    }
}
