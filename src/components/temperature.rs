//! Entropy temperature of SAC.
use {
    super::optim::{
        Optim,
        OptimizerKind,
    },
    anyhow::Result,
    candle_core::{
        DType,
        Device,
        Tensor,
    },
    candle_nn::{
        Init,
        VarBuilder,
        VarMap,
    },
    std::path::Path,
    tracing::info,
};


/// The target entropy used when the temperature is tuned automatically.
///
/// This is the negative number of discrete actions, `-|A|`.
pub fn target_entropy(size_action: usize) -> f64 {
    -(size_action as f64)
}

/// The entropy temperature `alpha`.
///
/// Either a fixed constant or learned through `log_alpha`, which keeps
/// `alpha = exp(log_alpha)` strictly positive. The value handed out by
/// [`Temperature::alpha`] is a plain number, so no gradient ever reaches
/// `log_alpha` through the critic or policy losses.
pub enum Temperature {
    Fixed(f64),
    Auto {
        varmap: VarMap,
        log_alpha: Tensor,
        target_entropy: f64,
        opt: Optim,
        alpha: f64,
    },
}

impl Temperature {
    pub fn fixed(alpha: f64) -> Self {
        Temperature::Fixed(alpha)
    }

    /// A learnable temperature starting at `alpha = 1`.
    pub fn auto(
        size_action: usize,
        optim: OptimizerKind,
        lr: f64,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let log_alpha = vb.get_with_hints(1, "log_alpha", Init::Const(0.0))?;
        let opt = optim.build(varmap.all_vars(), lr, None)?;
        let alpha = read_alpha(&log_alpha)?;
        Ok(Temperature::Auto {
            varmap,
            log_alpha,
            target_entropy: target_entropy(size_action),
            opt,
            alpha,
        })
    }

    pub fn alpha(&self) -> f64 {
        match self {
            Temperature::Fixed(alpha) => *alpha,
            Temperature::Auto { alpha, .. } => *alpha,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Temperature::Auto { .. })
    }

    /// One gradient step on `log_alpha` given the expected log-probability
    /// `E[log pi]` of each state in the batch, shape `(B, 1)`.
    ///
    /// loss = mean(-log_alpha * (E[log pi] + target_entropy))
    ///
    /// Returns the loss, or `None` when the temperature is fixed.
    pub fn update(
        &mut self,
        expected_log_probs: &Tensor,
    ) -> Result<Option<f32>> {
        match self {
            Temperature::Fixed(_) => Ok(None),
            Temperature::Auto {
                log_alpha,
                target_entropy,
                opt,
                alpha,
                ..
            } => {
                let entropy_error = (expected_log_probs.detach() + *target_entropy)?;
                let loss = (entropy_error.broadcast_mul(log_alpha)? * -1.0)?.mean_all()?;
                opt.backward_step(&loss)?;
                *alpha = read_alpha(log_alpha)?;
                Ok(Some(loss.to_scalar::<f32>()?))
            }
        }
    }

    /// Save `log_alpha` into a file. A fixed temperature has nothing to save.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<()> {
        if let Temperature::Auto { varmap, .. } = self {
            varmap.save(&path)?;
            info!("Saved temperature to {:?}", path.as_ref());
        }
        Ok(())
    }

    /// Load `log_alpha` from a file.
    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<()> {
        if let Temperature::Auto {
            varmap,
            log_alpha,
            alpha,
            ..
        } = self
        {
            varmap.load(&path)?;
            *alpha = read_alpha(log_alpha)?;
            info!("Loaded temperature from {:?}", path.as_ref());
        }
        Ok(())
    }
}

fn read_alpha(log_alpha: &Tensor) -> Result<f64> {
    let log_alpha = log_alpha.detach().to_dtype(DType::F64)?.to_vec1::<f64>()?;
    Ok(log_alpha[0].exp())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_entropy_is_negative_action_count() {
        assert_eq!(target_entropy(2), -2.0);
        assert_eq!(target_entropy(6), -6.0);
    }

    #[test]
    fn fixed_temperature_never_changes() -> Result<()> {
        let mut temperature = Temperature::fixed(0.01);
        let logp = Tensor::new(&[[-0.5f32], [-0.1]], &Device::Cpu)?;
        assert_eq!(temperature.update(&logp)?, None);
        assert_eq!(temperature.alpha(), 0.01);
        Ok(())
    }

    #[test]
    fn auto_temperature_stays_positive() -> Result<()> {
        let mut temperature = Temperature::auto(2, OptimizerKind::Adam, 0.05, &Device::Cpu)?;
        assert!((temperature.alpha() - 1.0).abs() < 1e-12);

        let logp = Tensor::new(&[[-0.01f32], [-0.02], [-0.03]], &Device::Cpu)?;
        for _ in 0..1000 {
            temperature.update(&logp)?;
            assert!(temperature.alpha() > 0.0);
        }
        Ok(())
    }

    #[test]
    fn entropy_above_target_lowers_alpha() -> Result<()> {
        let mut temperature = Temperature::auto(2, OptimizerKind::Adam, 0.01, &Device::Cpu)?;
        // E[log pi] + target = -2.01, so the loss is 2.01 * log_alpha.
        let logp = Tensor::new(&[[-0.01f32]], &Device::Cpu)?;
        let loss = temperature.update(&logp)?;
        assert_eq!(loss, Some(0.0));
        assert!(temperature.alpha() < 1.0);
        Ok(())
    }
}
