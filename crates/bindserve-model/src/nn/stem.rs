//! Modality preprocessors: patch or token embedding, class token, and learned
//! positional embedding.
use candle_core::{Device, Module, Result, Tensor};
use candle_nn::{Embedding, Init, LayerNorm, VarBuilder, embedding, layer_norm};

use crate::config::{AudioConfig, TextConfig, VisionConfig};

const EMBED_INIT: Init = Init::Randn {
    mean: 0.,
    stdev: 0.02,
};

/// Additive mask hiding positions after the query position.
pub fn causal_mask(len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..len)
        .flat_map(|i| (0..len).map(move |j| if j > i { f32::NEG_INFINITY } else { 0. }))
        .collect();
    Tensor::from_slice(&mask, (len, len), device)
}

/// Prepend the class token and add positional embeddings.
fn with_cls_and_pos(tokens: &Tensor, cls: &Tensor, pos: &Tensor) -> Result<Tensor> {
    let (b, _, dim) = tokens.dims3()?;
    let cls = cls.broadcast_as((b, 1, dim))?;
    Tensor::cat(&[&cls, tokens], 1)?.broadcast_add(pos)
}

/// `[batch, dim, h, w]` feature map to `[batch, h * w, dim]` tokens.
fn flatten_patches(x: &Tensor) -> Result<Tensor> {
    x.flatten_from(2)?.transpose(1, 2)?.contiguous()
}

/// Still-image patch embedding.
///
/// The checkpoint stem is a 3D convolution over a two-frame clip made by
/// repeating the image; with identical frames that is a 2D convolution with
/// the temporal kernel summed out.
#[derive(Debug, Clone)]
pub struct VisionStem {
    patch_weight: Tensor,
    cls_token: Tensor,
    pos_embed: Tensor,
    patch_size: usize,
}

impl VisionStem {
    pub fn load(vb: VarBuilder, cfg: &VisionConfig) -> Result<Self> {
        let dim = cfg.trunk.embed_dim;
        let p = cfg.patch_size;
        let conv3d = vb.pp("rgbt_stem").pp("proj").pp("1").get_with_hints(
            (dim, 3, cfg.kernel_frames, p, p),
            "weight",
            EMBED_INIT,
        )?;
        Ok(Self {
            patch_weight: conv3d.sum(2)?,
            cls_token: vb.get_with_hints((1, 1, dim), "cls_token", EMBED_INIT)?,
            pos_embed: vb.pp("pos_embedding_helper").get_with_hints(
                (1, cfg.num_patches() + 1, dim),
                "pos_embed",
                EMBED_INIT,
            )?,
            patch_size: p,
        })
    }

    /// `[batch, 3, size, size]` pixels to `[batch, patches + 1, dim]`.
    pub fn forward(&self, pixels: &Tensor) -> Result<Tensor> {
        let patches = pixels.conv2d(&self.patch_weight, 0, self.patch_size, 1, 1)?;
        with_cls_and_pos(&flatten_patches(&patches)?, &self.cls_token, &self.pos_embed)
    }
}

/// Token embedding plus positional embedding; no class token.
#[derive(Debug, Clone)]
pub struct TextStem {
    token_embedding: Embedding,
    pos_embed: Tensor,
}

impl TextStem {
    pub fn load(vb: VarBuilder, cfg: &TextConfig) -> Result<Self> {
        let dim = cfg.trunk.embed_dim;
        Ok(Self {
            token_embedding: embedding(cfg.vocab_size, dim, vb.pp("token_embedding"))?,
            pos_embed: vb.get_with_hints((1, cfg.context_length, dim), "pos_embed", EMBED_INIT)?,
        })
    }

    /// `[batch, context]` ids to `[batch, context, dim]`.
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        self.token_embedding.forward(ids)?.broadcast_add(&self.pos_embed)
    }
}

/// Spectrogram patch embedding with a LayerNorm over the patch tokens.
#[derive(Debug, Clone)]
pub struct AudioStem {
    patch_weight: Tensor,
    norm: LayerNorm,
    cls_token: Tensor,
    pos_embed: Tensor,
    stride: usize,
}

impl AudioStem {
    /// The stem norm keeps PyTorch's default epsilon, unlike the trunk.
    const NORM_EPS: f64 = 1e-5;

    pub fn load(vb: VarBuilder, cfg: &AudioConfig) -> Result<Self> {
        let dim = cfg.trunk.embed_dim;
        let p = cfg.patch_size;
        let stem = vb.pp("rgbt_stem");
        Ok(Self {
            patch_weight: stem
                .pp("proj")
                .pp("0")
                .get_with_hints((dim, 1, p, p), "weight", EMBED_INIT)?,
            norm: layer_norm(dim, Self::NORM_EPS, stem.pp("norm_layer"))?,
            cls_token: vb.get_with_hints((1, 1, dim), "cls_token", EMBED_INIT)?,
            pos_embed: vb.pp("pos_embedding_helper").get_with_hints(
                (1, cfg.num_patches() + 1, dim),
                "pos_embed",
                EMBED_INIT,
            )?,
            stride: cfg.patch_stride,
        })
    }

    /// `[clips, 1, mel_bins, frames]` to `[clips, patches + 1, dim]`.
    pub fn forward(&self, mels: &Tensor) -> Result<Tensor> {
        let patches = mels.conv2d(&self.patch_weight, 0, self.stride, 1, 1)?;
        let tokens = self.norm.forward(&flatten_patches(&patches)?)?;
        with_cls_and_pos(&tokens, &self.cls_token, &self.pos_embed)
    }
}
