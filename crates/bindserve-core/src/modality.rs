use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the input kinds the model can embed.
///
/// The derived ordering (text, vision, audio) is the order in which requests
/// are validated and batches are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Vision,
    Audio,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Vision, Modality::Audio];

    /// The request/response key for this modality.
    pub const fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Vision => "vision",
            Modality::Audio => "audio",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == key)
    }

    /// Keys accepted in `model_input`, in canonical order.
    pub fn valid_keys() -> Vec<String> {
        Self::ALL.iter().map(|m| m.as_str().to_string()).collect()
    }

    /// Vision and audio items travel as base64 strings.
    pub const fn is_binary(self) -> bool {
        matches!(self, Modality::Vision | Modality::Audio)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModality(pub String);

impl fmt::Display for UnknownModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown modality '{}'", self.0)
    }
}

impl std::error::Error for UnknownModality {}

impl FromStr for Modality {
    type Err = UnknownModality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| UnknownModality(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercase_and_ordered() {
        assert_eq!(Modality::valid_keys(), vec!["text", "vision", "audio"]);
        assert!(Modality::Text < Modality::Vision);
        assert!(Modality::Vision < Modality::Audio);
    }

    #[test]
    fn from_key_is_case_sensitive() {
        assert_eq!(Modality::from_key("vision"), Some(Modality::Vision));
        assert_eq!(Modality::from_key("Vision"), None);
        assert!("depth".parse::<Modality>().is_err());
    }

    #[test]
    fn serde_uses_key_names() {
        let json = serde_json::to_string(&Modality::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
        let back: Modality = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(back, Modality::Text);
    }
}
