use candle_core::{D, IndexOp, Module, Result, Tensor};
use candle_nn::{Init, LayerNorm, Linear, VarBuilder, layer_norm, linear_no_bias};

/// Which token of the trunk output becomes the embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pooling {
    ClassToken,
    /// Per-row position supplied by the caller (text end-of-text token).
    Positions,
}

/// LayerNorm, token selection, bias-free projection to the shared space.
#[derive(Debug, Clone)]
pub struct Head {
    norm: LayerNorm,
    proj: Linear,
    pooling: Pooling,
}

impl Head {
    /// `Sequential(LayerNorm, SelectElement(0), Linear)` as in the vision and
    /// audio heads.
    pub fn class_token(vb: VarBuilder, dim: usize, out_dim: usize, eps: f64) -> Result<Self> {
        Ok(Self {
            norm: layer_norm(dim, eps, vb.pp("0"))?,
            proj: linear_no_bias(dim, out_dim, vb.pp("2"))?,
            pooling: Pooling::ClassToken,
        })
    }

    /// The text head: select the end-of-text row, then `proj.0` / `proj.1`.
    pub fn end_of_text(vb: VarBuilder, dim: usize, out_dim: usize, eps: f64) -> Result<Self> {
        let proj = vb.pp("proj");
        Ok(Self {
            norm: layer_norm(dim, eps, proj.pp("0"))?,
            proj: linear_no_bias(dim, out_dim, proj.pp("1"))?,
            pooling: Pooling::Positions,
        })
    }

    /// `x` is `[batch, seq, dim]`. `positions` is required for the text head
    /// and ignored otherwise.
    pub fn forward(&self, x: &Tensor, positions: Option<&[u32]>) -> Result<Tensor> {
        // LayerNorm is per token, so selecting first is equivalent and cheaper
        let pooled = match (self.pooling, positions) {
            (Pooling::ClassToken, _) => x.i((.., 0, ..))?,
            (Pooling::Positions, Some(positions)) => {
                let rows = positions
                    .iter()
                    .enumerate()
                    .map(|(row, pos)| x.i((row, *pos as usize)))
                    .collect::<Result<Vec<_>>>()?;
                Tensor::stack(&rows, 0)?
            }
            (Pooling::Positions, None) => {
                candle_core::bail!("text head needs end-of-text positions")
            }
        };
        self.proj.forward(&self.norm.forward(&pooled)?)
    }
}

/// L2 normalisation, optionally followed by a clamped learned logit scale.
#[derive(Debug, Clone)]
pub struct Postprocessor {
    scale: Option<f64>,
}

impl Postprocessor {
    pub fn normalize_only() -> Self {
        Self { scale: None }
    }

    /// Reads `1.log_logit_scale` and fixes `min(exp(v), max_scale)` at load
    /// time.
    pub fn with_logit_scale(vb: VarBuilder, init: f64, max_scale: f64) -> Result<Self> {
        let log_scale = vb
            .pp("1")
            .get_with_hints((), "log_logit_scale", Init::Const(init.ln()))?
            .to_dtype(candle_core::DType::F64)?
            .to_scalar::<f64>()?;
        Ok(Self {
            scale: Some(log_scale.exp().min(max_scale)),
        })
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let norm = x
            .sqr()?
            .sum_keepdim(D::Minus1)?
            .sqrt()?
            .clamp(1e-12, f64::MAX)?;
        let x = x.broadcast_div(&norm)?;
        match self.scale {
            Some(scale) => x.affine(scale, 0.),
            None => Ok(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn normalised_rows_have_unit_norm() -> Result<()> {
        let x = Tensor::new(&[[3f32, 4.], [0., 0.]], &Device::Cpu)?;
        let y = Postprocessor::normalize_only().forward(&x)?.to_vec2::<f32>()?;
        assert!((y[0][0] - 0.6).abs() < 1e-6 && (y[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(y[1], vec![0., 0.]);
        Ok(())
    }

    #[test]
    fn logit_scale_is_clamped() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let post = Postprocessor::with_logit_scale(vb.pp("text"), 1000.0, 100.0)?;
        assert_eq!(post.scale(), Some(100.0));

        let post = Postprocessor::with_logit_scale(vb.pp("audio"), 20.0, 100.0)?;
        let scale = post.scale().unwrap();
        assert!((scale - 20.0).abs() < 1e-4);
        let y = post.forward(&Tensor::new(&[[1f32, 0.]], &Device::Cpu)?)?;
        assert!((y.to_vec2::<f32>()?[0][0] - 20.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn end_of_text_head_selects_given_rows() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let head = Head::end_of_text(vb, 4, 3, 1e-6)?;
        let x = Tensor::randn(0f32, 1.0, (2, 5, 4), &Device::Cpu)?;
        let out = head.forward(&x, Some(&[4, 1]))?;
        assert_eq!(out.dims(), &[2, 3]);

        let row1 = head.forward(&x.narrow(0, 1, 1)?.narrow(1, 1, 1)?, Some(&[0]))?;
        let diff = (out.narrow(0, 1, 1)? - row1)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        assert!(head.forward(&x, None).is_err());
        Ok(())
    }
}
