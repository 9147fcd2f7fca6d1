//! The three-tower ImageBind network.
use candle_core::{Device, Result, Tensor};
use candle_nn::VarBuilder;

use crate::config::ImageBindConfig;
use crate::nn::stem::causal_mask;
use crate::nn::{AudioStem, Head, Postprocessor, TextStem, Trunk, VisionStem};

/// Trunk, head and postprocessor shared by every modality.
#[derive(Debug, Clone)]
struct Tower {
    trunk: Trunk,
    head: Head,
    post: Postprocessor,
}

impl Tower {
    fn forward(&self, tokens: &Tensor, mask: Option<&Tensor>, positions: Option<&[u32]>) -> Result<Tensor> {
        let hidden = self.trunk.forward(tokens, mask)?;
        let pooled = self.head.forward(&hidden, positions)?;
        self.post.forward(&pooled)
    }
}

#[derive(Debug, Clone)]
pub struct ImageBind {
    vision_stem: VisionStem,
    vision: Tower,
    text_stem: TextStem,
    text: Tower,
    audio_stem: AudioStem,
    audio: Tower,
    config: ImageBindConfig,
    device: Device,
}

impl ImageBind {
    /// Build from a `VarBuilder` rooted at the checkpoint's top level.
    pub fn load(vb: VarBuilder, config: &ImageBindConfig) -> Result<Self> {
        let eps = config.layer_norm_eps;
        let out = config.out_embed_dim;
        let pre = vb.pp("modality_preprocessors");
        let trunks = vb.pp("modality_trunks");
        let heads = vb.pp("modality_heads");
        let posts = vb.pp("modality_postprocessors");

        let vision = Tower {
            trunk: Trunk::load(trunks.pp("vision"), &config.vision.trunk, eps)?,
            head: Head::class_token(heads.pp("vision"), config.vision.trunk.embed_dim, out, eps)?,
            post: Postprocessor::normalize_only(),
        };
        let text = Tower {
            trunk: Trunk::load(trunks.pp("text"), &config.text.trunk, eps)?,
            head: Head::end_of_text(heads.pp("text"), config.text.trunk.embed_dim, out, eps)?,
            post: Postprocessor::with_logit_scale(
                posts.pp("text"),
                config.text_logit_scale_init,
                config.max_logit_scale,
            )?,
        };
        let audio = Tower {
            trunk: Trunk::load(trunks.pp("audio"), &config.audio.trunk, eps)?,
            head: Head::class_token(heads.pp("audio"), config.audio.trunk.embed_dim, out, eps)?,
            post: Postprocessor::with_logit_scale(
                posts.pp("audio"),
                config.audio.logit_scale_init,
                config.max_logit_scale,
            )?,
        };

        Ok(Self {
            vision_stem: VisionStem::load(pre.pp("vision"), &config.vision)?,
            vision,
            text_stem: TextStem::load(pre.pp("text"), &config.text)?,
            text,
            audio_stem: AudioStem::load(pre.pp("audio"), &config.audio)?,
            audio,
            config: config.clone(),
            device: vb.device().clone(),
        })
    }

    pub fn config(&self) -> &ImageBindConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `[batch, 3, size, size]` normalised pixels to `[batch, out_dim]`.
    pub fn forward_vision(&self, pixels: &Tensor) -> Result<Tensor> {
        let tokens = self.vision_stem.forward(pixels)?;
        self.vision.forward(&tokens, None, None)
    }

    /// `[batch, context]` token ids pooled at `eos_positions`.
    pub fn forward_text(&self, ids: &Tensor, eos_positions: &[u32]) -> Result<Tensor> {
        let tokens = self.text_stem.forward(ids)?;
        let mask = causal_mask(tokens.dim(1)?, &self.device)?;
        self.text.forward(&tokens, Some(&mask), Some(eos_positions))
    }

    /// `[batch, clips, 1, mel_bins, frames]` to `[batch, out_dim]`; clip
    /// embeddings are averaged after postprocessing.
    pub fn forward_audio(&self, mels: &Tensor) -> Result<Tensor> {
        let (b, clips, c, bins, frames) = mels.dims5()?;
        let flat = mels.reshape((b * clips, c, bins, frames))?;
        let tokens = self.audio_stem.forward(&flat)?;
        let per_clip = self.audio.forward(&tokens, None, None)?;
        per_clip
            .reshape((b, clips, self.config.out_embed_dim))?
            .mean(1)
    }
}
