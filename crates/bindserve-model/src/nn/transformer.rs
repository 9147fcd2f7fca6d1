use candle_core::{Module, Result, Tensor};
use candle_nn::{LayerNorm, Linear, VarBuilder, layer_norm, linear};

use super::attention::MultiheadAttention;
use crate::config::TrunkConfig;

#[derive(Debug, Clone)]
pub struct Mlp {
    fc1: Linear,
    fc2: Linear,
}

impl Mlp {
    pub fn load(vb: VarBuilder, dim: usize, hidden: usize) -> Result<Self> {
        Ok(Self {
            fc1: linear(dim, hidden, vb.pp("fc1"))?,
            fc2: linear(hidden, dim, vb.pp("fc2"))?,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.fc2.forward(&self.fc1.forward(x)?.gelu_erf()?)
    }
}

/// Pre-norm residual block: attention then MLP.
#[derive(Debug, Clone)]
pub struct Block {
    norm_1: LayerNorm,
    attn: MultiheadAttention,
    norm_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    pub fn load(vb: VarBuilder, cfg: &TrunkConfig, eps: f64) -> Result<Self> {
        let dim = cfg.embed_dim;
        Ok(Self {
            norm_1: layer_norm(dim, eps, vb.pp("norm_1"))?,
            attn: MultiheadAttention::load(vb.pp("attn"), dim, cfg.num_heads, cfg.add_bias_kv)?,
            norm_2: layer_norm(dim, eps, vb.pp("norm_2"))?,
            mlp: Mlp::load(vb.pp("mlp"), dim, cfg.mlp_dim())?,
        })
    }

    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let x = (x + self.attn.forward(&self.norm_1.forward(x)?, mask)?)?;
        &x + self.mlp.forward(&self.norm_2.forward(&x)?)?
    }
}

/// A modality's transformer: optional input LayerNorm, then the blocks.
#[derive(Debug, Clone)]
pub struct Trunk {
    pre_norm: Option<LayerNorm>,
    blocks: Vec<Block>,
}

impl Trunk {
    pub fn load(vb: VarBuilder, cfg: &TrunkConfig, eps: f64) -> Result<Self> {
        let pre_norm = if cfg.pre_transformer_ln {
            Some(layer_norm(cfg.embed_dim, eps, vb.pp("pre_transformer_layer").pp("0"))?)
        } else {
            None
        };
        let blocks_vb = vb.pp("blocks");
        let blocks = (0..cfg.num_blocks)
            .map(|i| Block::load(blocks_vb.pp(i.to_string()), cfg, eps))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pre_norm, blocks })
    }

    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let mut x = match &self.pre_norm {
            Some(norm) => norm.forward(x)?,
            None => x.clone(),
        };
        for block in &self.blocks {
            x = block.forward(&x, mask)?;
        }
        Ok(x)
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }
}
