use {
    super::OffPolicyConfig,
    crate::{
        components::{
            Activation,
            OptimizerKind,
        },
        error::SacError,
    },
    serde::{
        Deserialize,
        Serialize,
    },
};


#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SAC_Config {
    // Seed for parameter initialization, replay sampling and action sampling.
    pub seed: u64,
    // The capacity of the replay buffer used for sampling training data.
    pub buffer_size: usize,
    // The training batch size for each update.
    pub batch_size: usize,
    // How many updates to perform in one learning step.
    pub num_updates: usize,
    // How many environment steps between learning steps.
    pub update_every: usize,
    // Sizes of the state and action spaces. Taken from the environment when
    // left empty, otherwise they must agree with it.
    pub state_size: Option<usize>,
    pub action_size: Option<usize>,
    // The discount factor.
    pub gamma: f64,
    // The interpolation weight for updating the target networks.
    pub tau: f64,
    // The learning rates for the policy and the critic networks.
    pub lr_actor: f64,
    pub lr_critic: f64,
    // The hidden layer widths of the policy and the critic networks.
    pub hidden_actor: Vec<usize>,
    pub hidden_critic: Vec<usize>,
    // The nonlinearity after each hidden layer.
    pub activ_actor: Activation,
    pub activ_critic: Activation,
    // The optimizers of the policy and the critic networks.
    pub optim_actor: OptimizerKind,
    pub optim_critic: OptimizerKind,
    // Maximum gradient norm, no clipping when empty.
    pub grad_clip_actor: Option<f64>,
    pub grad_clip_critic: Option<f64>,
    // Huber (smooth L1) loss for the critics instead of mean squared error.
    pub use_huber_loss: bool,
    // The entropy temperature, used as is unless auto tuning is enabled.
    pub alpha: f64,
    // Learn log(alpha) toward the target entropy.
    pub alpha_auto_tuning: bool,
    pub optim_alpha: OptimizerKind,
    pub lr_alpha: f64,
}

impl Default for SAC_Config {
    fn default() -> Self {
        Self {
            seed: 0,
            buffer_size: 1_000_000,
            batch_size: 128,
            num_updates: 1,
            update_every: 1,
            state_size: None,
            action_size: None,
            gamma: 0.99,
            tau: 1e-3,
            lr_actor: 3e-4,
            lr_critic: 3e-4,
            hidden_actor: vec![256, 256],
            hidden_critic: vec![256, 256],
            activ_actor: Activation::Relu,
            activ_critic: Activation::Relu,
            optim_actor: OptimizerKind::Adam,
            optim_critic: OptimizerKind::Adam,
            grad_clip_actor: None,
            grad_clip_critic: None,
            use_huber_loss: false,
            alpha: 0.01,
            alpha_auto_tuning: true,
            optim_alpha: OptimizerKind::Adam,
            lr_alpha: 3e-4,
        }
    }
}

impl SAC_Config {
    pub fn cartpole() -> Self {
        Self {
            batch_size: 64,
            tau: 1e-2,
            lr_actor: 1e-3,
            lr_critic: 1e-3,
            hidden_actor: vec![64, 64],
            hidden_critic: vec![64, 64],
            grad_clip_actor: Some(5.0),
            grad_clip_critic: Some(5.0),
            ..Default::default()
        }
    }

    /// Check every option for a usable value.
    pub fn validate(&self) -> Result<(), SacError> {
        let invalid = |msg: String| Err(SacError::InvalidConfig(msg));

        if self.buffer_size == 0 {
            return invalid("buffer_size must be positive".into());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive".into());
        }
        // learning needs more stored transitions than one batch
        if self.batch_size >= self.buffer_size {
            return invalid(format!(
                "batch_size ({}) must be smaller than buffer_size ({})",
                self.batch_size, self.buffer_size,
            ));
        }
        if self.num_updates == 0 {
            return invalid("num_updates must be positive".into());
        }
        if self.update_every == 0 {
            return invalid("update_every must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return invalid(format!("tau must be in (0, 1], got {}", self.tau));
        }
        for (name, lr) in [
            ("lr_actor", self.lr_actor),
            ("lr_critic", self.lr_critic),
            ("lr_alpha", self.lr_alpha),
        ] {
            if !(lr > 0.0) {
                return invalid(format!("{name} must be positive, got {lr}"));
            }
        }
        for (name, clip) in [
            ("grad_clip_actor", self.grad_clip_actor),
            ("grad_clip_critic", self.grad_clip_critic),
        ] {
            if let Some(clip) = clip {
                if !(clip > 0.0) {
                    return invalid(format!("{name} must be positive, got {clip}"));
                }
            }
        }
        if !self.alpha_auto_tuning && !(self.alpha > 0.0) {
            return invalid(format!("alpha must be positive, got {}", self.alpha));
        }
        if self.hidden_actor.contains(&0) || self.hidden_critic.contains(&0) {
            return invalid("hidden layer widths must be positive".into());
        }
        Ok(())
    }

    /// Resolve the state and action sizes against those of the environment.
    pub fn resolve_sizes(
        &self,
        size_state: usize,
        size_action: usize,
    ) -> Result<(usize, usize), SacError> {
        for (name, configured, actual) in [
            ("state_size", self.state_size, size_state),
            ("action_size", self.action_size, size_action),
        ] {
            if let Some(configured) = configured {
                if configured != actual {
                    return Err(SacError::InvalidConfig(format!(
                        "{name} is {configured} but the environment has {actual}",
                    )));
                }
            }
        }
        if size_state == 0 || size_action == 0 {
            return Err(SacError::InvalidConfig(
                "state and action sizes must be positive".into(),
            ));
        }
        Ok((size_state, size_action))
    }
}

impl OffPolicyConfig for SAC_Config {
    fn seed(&self) -> u64 {
        self.seed
    }
    fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }
    fn replay_buffer_capacity(&self) -> usize {
        self.buffer_size
    }
    fn training_batch_size(&self) -> usize {
        self.batch_size
    }
    fn update_every(&self) -> usize {
        self.update_every
    }
    fn num_updates(&self) -> usize {
        self.num_updates
    }
}
