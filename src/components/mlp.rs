use {
    crate::error::SacError,
    candle_core::{
        DType,
        Device,
        Result,
        Tensor,
    },
    candle_nn::{
        linear,
        sequential::seq,
        Sequential,
        VarBuilder,
        VarMap,
    },
    rand::{
        distributions::Uniform,
        Rng,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    strum::{
        Display,
        EnumString,
    },
};


/// The nonlinearity applied after every hidden layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    Elu,
    LeakyRelu,
    Gelu,
    Silu,
}
impl Activation {
    pub fn apply(
        &self,
        xs: &Tensor,
    ) -> Result<Tensor> {
        match self {
            Activation::Relu => xs.relu(),
            Activation::Tanh => xs.tanh(),
            Activation::Sigmoid => candle_nn::ops::sigmoid(xs),
            Activation::Elu => xs.elu(1.0),
            Activation::LeakyRelu => candle_nn::ops::leaky_relu(xs, 0.01),
            Activation::Gelu => xs.gelu_erf(),
            Activation::Silu => xs.silu(),
        }
    }
}

/// Layer dimensions `(in, out)` for a stack `size_in -> hidden.. -> size_out`.
pub fn layer_dims(
    size_in: usize,
    hidden: &[usize],
    size_out: usize,
) -> Vec<(usize, usize)> {
    let sizes: Vec<usize> = std::iter::once(size_in)
        .chain(hidden.iter().copied())
        .chain(std::iter::once(size_out))
        .collect();
    sizes.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Build a feed-forward network whose variables live in `varmap`.
///
/// Layers are named `{prefix}-fc{i}`. The activation follows every layer
/// except the last one, whose output is returned raw.
pub fn build_mlp(
    varmap: &VarMap,
    device: &Device,
    prefix: &str,
    dims: &[(usize, usize)],
    activation: Activation,
) -> Result<Sequential> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
    let mut network = seq();
    for (i, &(in_dim, out_dim)) in dims.iter().enumerate() {
        network = network.add(linear(in_dim, out_dim, vb.pp(format!("{prefix}-fc{i}")))?);
        if i + 1 < dims.len() {
            network = network.add_fn(move |xs| activation.apply(xs));
        }
    }
    Ok(network)
}

/// Re-draw every weight and bias of the network uniformly from
/// `[-1/sqrt(fan_in), 1/sqrt(fan_in)]` using the given rng.
pub fn reset_parameters<R: Rng + ?Sized>(
    varmap: &VarMap,
    prefix: &str,
    dims: &[(usize, usize)],
    rng: &mut R,
) -> anyhow::Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| SacError::PoisonedParameters)?;

    for (i, &(in_dim, out_dim)) in dims.iter().enumerate() {
        let lim = 1.0 / (in_dim as f32).sqrt();
        let dist = Uniform::new_inclusive(-lim, lim);

        for (suffix, count) in [("weight", in_dim * out_dim), ("bias", out_dim)] {
            let name = format!("{prefix}-fc{i}.{suffix}");
            let var = data
                .get(&name)
                .ok_or_else(|| anyhow::anyhow!("no parameter named {name}"))?;
            let values: Vec<f32> = (0..count).map(|_| rng.sample(&dist)).collect();
            var.set(&Tensor::from_vec(values, var.shape(), var.device())?)?;
        }
    }
    Ok(())
}
