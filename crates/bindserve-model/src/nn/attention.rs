use candle_core::{D, Module, Result, Tensor};
use candle_nn::init::DEFAULT_KAIMING_NORMAL;
use candle_nn::{Init, Linear, VarBuilder, linear};

/// `torch.nn.MultiheadAttention` (packed input projection), batch first.
#[derive(Debug, Clone)]
pub struct MultiheadAttention {
    in_proj: Linear,
    out_proj: Linear,
    /// Extra learned key and value tokens, `[1, 1, dim]` each.
    bias_kv: Option<(Tensor, Tensor)>,
    num_heads: usize,
    head_dim: usize,
}

impl MultiheadAttention {
    pub fn load(vb: VarBuilder, dim: usize, num_heads: usize, add_bias_kv: bool) -> Result<Self> {
        let in_weight = vb.get_with_hints((3 * dim, dim), "in_proj_weight", DEFAULT_KAIMING_NORMAL)?;
        let in_bias = vb.get_with_hints(3 * dim, "in_proj_bias", Init::Const(0.))?;
        let out_proj = linear(dim, dim, vb.pp("out_proj"))?;
        let bias_kv = if add_bias_kv {
            let init = Init::Randn {
                mean: 0.,
                stdev: 0.02,
            };
            Some((
                vb.get_with_hints((1, 1, dim), "bias_k", init)?,
                vb.get_with_hints((1, 1, dim), "bias_v", init)?,
            ))
        } else {
            None
        };
        Ok(Self {
            in_proj: Linear::new(in_weight, Some(in_bias)),
            out_proj,
            bias_kv,
            num_heads,
            head_dim: dim / num_heads,
        })
    }

    fn split_heads(&self, x: &Tensor) -> Result<Tensor> {
        let (b, len, _) = x.dims3()?;
        x.reshape((b, len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// `x` is `[batch, seq, dim]`; `mask` is an additive `[seq, seq]` mask.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let (b, len, dim) = x.dims3()?;
        let qkv = self.in_proj.forward(x)?;
        let q = qkv.narrow(D::Minus1, 0, dim)?;
        let mut k = qkv.narrow(D::Minus1, dim, dim)?;
        let mut v = qkv.narrow(D::Minus1, 2 * dim, dim)?;

        let mut mask = mask.cloned();
        if let Some((bias_k, bias_v)) = &self.bias_kv {
            k = Tensor::cat(&[&k, &bias_k.broadcast_as((b, 1, dim))?], 1)?;
            v = Tensor::cat(&[&v, &bias_v.broadcast_as((b, 1, dim))?], 1)?;
            mask = mask.map(|m| m.pad_with_zeros(D::Minus1, 0, 1)).transpose()?;
        }

        let q = self.split_heads(&q)?;
        let k = self.split_heads(&k)?;
        let v = self.split_heads(&v)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.t()?.contiguous()?)? * scale)?;
        let scores = match &mask {
            Some(m) => scores.broadcast_add(m)?,
            None => scores,
        };
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;
        let out = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b, len, dim))?;
        self.out_proj.forward(&out)
    }
}
