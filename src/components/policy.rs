use {
    super::mlp::{
        build_mlp,
        layer_dims,
        reset_parameters,
        Activation,
    },
    crate::error::SacError,
    anyhow::{
        anyhow,
        Result,
    },
    candle_core::{
        DType,
        Device,
        Module,
        Tensor,
        D,
    },
    candle_nn::{
        ops::softmax,
        Sequential,
        VarMap,
    },
    rand::{
        distributions::{
            Distribution,
            WeightedIndex,
        },
        Rng,
    },
    std::path::Path,
    tracing::info,
};


/// Substituted for probabilities that are exactly zero before taking the log.
pub const LOG_PROB_EPSILON: f64 = 1e-6;

/// Anything that can be turned into a batch of states `(B, S)`.
///
/// Single states get a leading batch dimension of size 1.
pub trait StateBatch {
    fn to_batch(
        &self,
        device: &Device,
    ) -> candle_core::Result<Tensor>;
}
impl StateBatch for Tensor {
    fn to_batch(
        &self,
        device: &Device,
    ) -> candle_core::Result<Tensor> {
        let xs = self.to_device(device)?.to_dtype(DType::F32)?;
        if xs.rank() == 1 {
            xs.unsqueeze(0)
        } else {
            Ok(xs)
        }
    }
}
impl StateBatch for [f32] {
    fn to_batch(
        &self,
        device: &Device,
    ) -> candle_core::Result<Tensor> {
        Tensor::from_slice(self, (1, self.len()), device)
    }
}
impl StateBatch for Vec<f32> {
    fn to_batch(
        &self,
        device: &Device,
    ) -> candle_core::Result<Tensor> {
        self.as_slice().to_batch(device)
    }
}
impl StateBatch for [Vec<f32>] {
    fn to_batch(
        &self,
        device: &Device,
    ) -> candle_core::Result<Tensor> {
        let size_state = self.first().map_or(0, |s| s.len());
        Tensor::from_vec(self.concat(), (self.len(), size_state), device)
    }
}

/// The output of one pass through the policy.
///
/// * `actions` - One sampled action per row of the input.
/// * `probs` - `(B, A)` action probabilities.
/// * `log_probs` - `(B, A)` element-wise log of `probs`.
pub struct PolicySample {
    pub actions: Vec<usize>,
    pub probs: Tensor,
    pub log_probs: Tensor,
}

/// A categorical policy over a fixed set of discrete actions.
///
/// The network maps a state to one logit per action.
pub struct CategoricalPolicy {
    varmap: VarMap,
    network: Sequential,
    dims: Vec<(usize, usize)>,
    activation: Activation,
    device: Device,
}

impl CategoricalPolicy {
    pub fn new(
        device: &Device,
        size_state: usize,
        size_action: usize,
        hidden: &[usize],
        activation: Activation,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let dims = layer_dims(size_state, hidden, size_action);
        let network = build_mlp(&varmap, device, "policy", &dims, activation)?;
        Ok(Self {
            varmap,
            network,
            dims,
            activation,
            device: device.clone(),
        })
    }

    /// Re-initialize all weights from the given rng.
    pub fn reset_parameters<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<()> {
        reset_parameters(&self.varmap, "policy", &self.dims, rng)
    }

    /// The raw action logits, shape `(B, A)`.
    pub fn forward<S: StateBatch + ?Sized>(
        &self,
        state: &S,
    ) -> Result<Tensor> {
        Ok(self.network.forward(&state.to_batch(&self.device)?)?)
    }

    /// Action probabilities and their logs, without drawing any action.
    ///
    /// Zero probabilities are replaced by [`LOG_PROB_EPSILON`] before the
    /// log so that no entry becomes `-inf`.
    pub fn action_probs<S: StateBatch + ?Sized>(
        &self,
        state: &S,
    ) -> Result<(Tensor, Tensor)> {
        let logits = self.forward(state)?;
        let probs = softmax(&logits, D::Minus1)?;
        let zeros = probs
            .eq(0.0)?
            .to_dtype(DType::F32)?
            .detach();
        let log_probs = (&probs + (zeros * LOG_PROB_EPSILON)?)?.log()?;
        Ok((probs, log_probs))
    }

    /// Sample one action per row from the categorical distribution.
    pub fn sample_action<S: StateBatch + ?Sized, R: Rng + ?Sized>(
        &self,
        state: &S,
        rng: &mut R,
    ) -> Result<PolicySample> {
        let (probs, log_probs) = self.action_probs(state)?;
        let actions = probs
            .to_vec2::<f32>()?
            .iter()
            .map(|row| {
                WeightedIndex::new(row)
                    .map(|dist| dist.sample(rng))
                    .map_err(|e| anyhow!("invalid action probabilities {row:?}: {e}"))
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(PolicySample {
            actions,
            probs,
            log_probs,
        })
    }

    /// The most likely action of every row.
    pub fn greedy_action<S: StateBatch + ?Sized>(
        &self,
        state: &S,
    ) -> Result<Vec<usize>> {
        let actions = self
            .forward(state)?
            .argmax_keepdim(D::Minus1)?
            .flatten_all()?
            .to_vec1::<u32>()?;
        Ok(actions.into_iter().map(|a| a as usize).collect())
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn summary(&self) -> String {
        describe("CategoricalPolicy", &self.dims, self.activation)
    }

    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Saved policy to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<()> {
        if !path.as_ref().is_file() {
            Err(SacError::MissingCheckpoint(path.as_ref().to_path_buf()))?
        }
        self.varmap.load(&path)?;
        info!("Loaded policy from {:?}", path.as_ref());
        Ok(())
    }
}

/// A short, human readable description of a feed-forward stack.
pub(crate) fn describe(
    name: &str,
    dims: &[(usize, usize)],
    activation: Activation,
) -> String {
    let layers: Vec<String> = dims
        .iter()
        .enumerate()
        .map(|(i, (in_dim, out_dim))| {
            if i + 1 < dims.len() {
                format!("  Linear({in_dim} -> {out_dim}) + {activation}")
            } else {
                format!("  Linear({in_dim} -> {out_dim})")
            }
        })
        .collect();
    format!("{name}(\n{}\n)", layers.join("\n"))
}
