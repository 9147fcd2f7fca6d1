//! Architecture and preprocessing hyperparameters.
//!
//! `ImageBindConfig::default()` is `imagebind_huge`, the only released
//! checkpoint. Every field is serde-defaulted so a deployment can override a
//! single value from its config file.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Shape of one modality's transformer trunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrunkConfig {
    pub embed_dim: usize,
    pub num_blocks: usize,
    pub num_heads: usize,
    #[serde(default = "default_mlp_ratio")]
    pub mlp_ratio: usize,
    /// LayerNorm applied to the token sequence before the first block.
    #[serde(default)]
    pub pre_transformer_ln: bool,
    /// Learned key/value bias tokens appended inside attention.
    #[serde(default)]
    pub add_bias_kv: bool,
}

fn default_mlp_ratio() -> usize {
    4
}

impl TrunkConfig {
    pub fn head_dim(&self) -> usize {
        self.embed_dim / self.num_heads
    }

    pub fn mlp_dim(&self) -> usize {
        self.embed_dim * self.mlp_ratio
    }

    fn validate(&self, name: &str) -> Result<(), ModelError> {
        if self.num_heads == 0 || self.embed_dim % self.num_heads != 0 {
            return Err(ModelError::Config(format!(
                "{name} trunk: embed_dim {} is not divisible by num_heads {}",
                self.embed_dim, self.num_heads
            )));
        }
        if self.num_blocks == 0 {
            return Err(ModelError::Config(format!("{name} trunk has no blocks")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub trunk: TrunkConfig,
    pub image_size: usize,
    pub patch_size: usize,
    /// Temporal kernel of the video stem; still images are repeated to fill it.
    pub kernel_frames: usize,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            trunk: TrunkConfig {
                embed_dim: 1280,
                num_blocks: 32,
                num_heads: 16,
                mlp_ratio: 4,
                pre_transformer_ln: true,
                add_bias_kv: false,
            },
            image_size: 224,
            patch_size: 14,
            kernel_frames: 2,
            mean: [0.481_454_66, 0.457_827_5, 0.408_210_73],
            std: [0.268_629_54, 0.261_302_58, 0.275_777_1],
        }
    }
}

impl VisionConfig {
    pub fn num_patches(&self) -> usize {
        let side = self.image_size / self.patch_size;
        side * side
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub trunk: TrunkConfig,
    pub context_length: usize,
    pub vocab_size: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            trunk: TrunkConfig {
                embed_dim: 1024,
                num_blocks: 24,
                num_heads: 16,
                mlp_ratio: 4,
                pre_transformer_ln: false,
                add_bias_kv: false,
            },
            context_length: 77,
            vocab_size: 49408,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub trunk: TrunkConfig,
    pub num_mel_bins: usize,
    /// Frames per clip after padding or cropping the filterbank.
    pub target_length: usize,
    pub patch_size: usize,
    pub patch_stride: usize,
    pub sample_rate: u32,
    pub clip_duration: f64,
    pub clips_per_item: usize,
    pub mean: f32,
    pub std: f32,
    pub logit_scale_init: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            trunk: TrunkConfig {
                embed_dim: 768,
                num_blocks: 12,
                num_heads: 12,
                mlp_ratio: 4,
                pre_transformer_ln: false,
                add_bias_kv: true,
            },
            num_mel_bins: 128,
            target_length: 204,
            patch_size: 16,
            patch_stride: 10,
            sample_rate: 16_000,
            clip_duration: 2.0,
            clips_per_item: 3,
            mean: -4.268,
            std: 9.138,
            logit_scale_init: 20.0,
        }
    }
}

impl AudioConfig {
    pub fn patch_grid(&self) -> (usize, usize) {
        let rows = (self.num_mel_bins - self.patch_size) / self.patch_stride + 1;
        let cols = (self.target_length - self.patch_size) / self.patch_stride + 1;
        (rows, cols)
    }

    pub fn num_patches(&self) -> usize {
        let (rows, cols) = self.patch_grid();
        rows * cols
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBindConfig {
    pub out_embed_dim: usize,
    pub layer_norm_eps: f64,
    /// Upper bound on the learned logit scale multiplier.
    pub max_logit_scale: f64,
    /// Initial text logit scale, used only when a checkpoint omits it.
    pub text_logit_scale_init: f64,
    pub vision: VisionConfig,
    pub text: TextConfig,
    pub audio: AudioConfig,
}

impl Default for ImageBindConfig {
    fn default() -> Self {
        Self {
            out_embed_dim: 1024,
            layer_norm_eps: 1e-6,
            max_logit_scale: 100.0,
            text_logit_scale_init: 1.0 / 0.07,
            vision: VisionConfig::default(),
            text: TextConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl ImageBindConfig {
    pub fn huge() -> Self {
        Self::default()
    }

    /// A miniature configuration for exercising the network without weights.
    pub fn tiny() -> Self {
        let trunk = |pre_transformer_ln, add_bias_kv| TrunkConfig {
            embed_dim: 32,
            num_blocks: 2,
            num_heads: 4,
            mlp_ratio: 4,
            pre_transformer_ln,
            add_bias_kv,
        };
        Self {
            out_embed_dim: 16,
            vision: VisionConfig {
                trunk: trunk(true, false),
                image_size: 28,
                ..VisionConfig::default()
            },
            text: TextConfig {
                trunk: trunk(false, false),
                context_length: 8,
                vocab_size: 64,
            },
            audio: AudioConfig {
                trunk: trunk(false, true),
                num_mel_bins: 26,
                target_length: 36,
                ..AudioConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.vision.trunk.validate("vision")?;
        self.text.trunk.validate("text")?;
        self.audio.trunk.validate("audio")?;
        if self.vision.patch_size == 0 || self.vision.image_size % self.vision.patch_size != 0 {
            return Err(ModelError::Config(format!(
                "image_size {} is not a multiple of patch_size {}",
                self.vision.image_size, self.vision.patch_size
            )));
        }
        if self.audio.num_mel_bins < self.audio.patch_size
            || self.audio.target_length < self.audio.patch_size
            || self.audio.patch_stride == 0
        {
            return Err(ModelError::Config(
                "audio spectrogram is smaller than one patch".into(),
            ));
        }
        if self.audio.clips_per_item == 0 || self.audio.clip_duration <= 0.0 {
            return Err(ModelError::Config(
                "audio clip sampling needs at least one clip of positive duration".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_matches_released_checkpoint_shapes() {
        let cfg = ImageBindConfig::huge();
        assert_eq!(cfg.vision.num_patches() + 1, 257);
        assert_eq!(cfg.audio.patch_grid(), (12, 19));
        assert_eq!(cfg.audio.num_patches() + 1, 229);
        assert_eq!(cfg.text.trunk.head_dim(), 64);
        cfg.validate().unwrap();
    }

    #[test]
    fn tiny_is_consistent() {
        let cfg = ImageBindConfig::tiny();
        cfg.validate().unwrap();
        assert_eq!(cfg.vision.num_patches(), 4);
        assert_eq!(cfg.audio.patch_grid(), (2, 3));
    }

    #[test]
    fn partial_json_overrides_keep_defaults() {
        let cfg: ImageBindConfig =
            serde_json::from_str(r#"{"audio": {"clips_per_item": 1}}"#).unwrap();
        assert_eq!(cfg.audio.clips_per_item, 1);
        assert_eq!(cfg.audio.num_mel_bins, 128);
        assert_eq!(cfg.vision.trunk.embed_dim, 1280);
    }

    #[test]
    fn indivisible_heads_are_rejected() {
        let mut cfg = ImageBindConfig::tiny();
        cfg.text.trunk.num_heads = 5;
        assert!(matches!(cfg.validate(), Err(ModelError::Config(_))));
    }
}
