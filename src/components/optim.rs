//! Optimizers with optional gradient-norm clipping.
use {
    anyhow::Result,
    candle_core::{
        backprop::GradStore,
        Tensor,
        Var,
    },
    candle_nn::{
        AdamW,
        Optimizer as _,
        ParamsAdamW,
        SGD,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    strum::{
        Display,
        EnumString,
    },
    tracing::trace,
};


/// Which optimizer to build for a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam, i.e. AdamW without weight decay.
    Adam,
    /// AdamW with the default weight decay.
    AdamW,
    /// Plain stochastic gradient descent.
    Sgd,
}
impl OptimizerKind {
    /// Constructs the optimizer over the given variables.
    pub fn build(
        &self,
        vars: Vec<Var>,
        lr: f64,
        grad_clip: Option<f64>,
    ) -> Result<Optim> {
        let inner = match self {
            OptimizerKind::Adam => Inner::AdamW(AdamW::new(
                vars.clone(),
                ParamsAdamW {
                    lr,
                    weight_decay: 0.0,
                    ..Default::default()
                },
            )?),
            OptimizerKind::AdamW => Inner::AdamW(AdamW::new(
                vars.clone(),
                ParamsAdamW {
                    lr,
                    ..Default::default()
                },
            )?),
            OptimizerKind::Sgd => Inner::Sgd(SGD::new(vars.clone(), lr)?),
        };
        Ok(Optim {
            inner,
            vars,
            grad_clip,
        })
    }
}

enum Inner {
    AdamW(AdamW),
    Sgd(SGD),
}

/// An optimizer together with the variables it owns and its clipping bound.
pub struct Optim {
    inner: Inner,
    vars: Vec<Var>,
    grad_clip: Option<f64>,
}

impl Optim {
    /// Backpropagates `loss`, clips the gradients of the owned variables and
    /// applies one optimization step.
    ///
    /// Gradients are recomputed from scratch on every call, so there is no
    /// accumulated state to zero beforehand.
    pub fn backward_step(
        &mut self,
        loss: &Tensor,
    ) -> Result<()> {
        let mut grads = loss.backward()?;
        if let Some(max_norm) = self.grad_clip {
            let norm = clip_grad_norm(&mut grads, &self.vars, max_norm)?;
            trace!("gradient norm before clipping: {norm}");
        }
        match &mut self.inner {
            Inner::AdamW(opt) => opt.step(&grads)?,
            Inner::Sgd(opt) => opt.step(&grads)?,
        }
        Ok(())
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }
}

/// Rescale the gradients of `vars` so that their joint L2 norm does not
/// exceed `max_norm`. Returns the norm before clipping.
pub fn clip_grad_norm(
    grads: &mut GradStore,
    vars: &[Var],
    max_norm: f64,
) -> Result<f64> {
    let mut total = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total += grad.sqr()?.sum_all()?.to_dtype(candle_core::DType::F64)?.to_scalar::<f64>()?;
        }
    }
    let norm = total.sqrt();

    let scale = max_norm / (norm + 1e-6);
    if scale < 1.0 {
        for var in vars {
            if let Some(grad) = grads.get(var.as_tensor()) {
                let clipped = (grad * scale)?;
                grads.insert(var.as_tensor(), clipped);
            }
        }
    }
    Ok(norm)
}
