use {
    super::{
        Algorithm,
        Losses,
        RunMode,
        SaveableAlgorithm,
    },
    crate::{
        components::{
            Batch,
            CategoricalPolicy,
            Critic,
            Optim,
            Temperature,
            Transition,
        },
        configs::SAC_Config,
        error::SacError,
    },
    anyhow::Result,
    candle_core::{
        Device,
        Tensor,
    },
    candle_nn::loss::mse,
    rand::{
        rngs::StdRng,
        SeedableRng,
    },
    std::path::{
        Path,
        PathBuf,
    },
    tracing::{
        info,
        trace,
    },
};

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
fn smooth_l1_loss(
    x: &Tensor,
    y: &Tensor,
) -> candle_core::Result<Tensor> {
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(x.dtype())?.detach();
    let m2 = (1.0 - &m1)?;
    (((0.5 * &m1)? * d.sqr()?)? + (m2 * (d - 0.5)?)?)?.mean_all()
}

/// Soft Actor-Critic for discrete action spaces.
///
/// The policy is a categorical distribution over the actions and the twin
/// critics output one Q-value per action, so every expectation over actions is
/// computed exactly as a probability weighted sum instead of being sampled.
///
/// See <https://arxiv.org/abs/1910.07207> and <https://arxiv.org/abs/1801.01290>.
#[allow(clippy::upper_case_acronyms)]
pub struct SAC {
    config: SAC_Config,
    device: Device,
    policy: CategoricalPolicy,
    policy_optim: Optim,
    q1_local: Critic,
    q1_target: Critic,
    q1_optim: Optim,
    q2_local: Critic,
    q2_target: Critic,
    q2_optim: Optim,
    temperature: Temperature,
    rng: StdRng,
}

impl SAC {
    pub fn new(
        device: &Device,
        config: &SAC_Config,
        size_state: usize,
        size_action: usize,
    ) -> Result<Self> {
        config.validate()?;
        let (size_state, size_action) = config.resolve_sizes(size_state, size_action)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let policy = CategoricalPolicy::new(
            device,
            size_state,
            size_action,
            &config.hidden_actor,
            config.activ_actor,
        )?;
        policy.reset_parameters(&mut rng)?;
        let policy_optim = config.optim_actor.build(
            policy.varmap().all_vars(),
            config.lr_actor,
            config.grad_clip_actor,
        )?;

        let make_critic = |rng: &mut StdRng| -> Result<(Critic, Critic, Optim)> {
            let local = Critic::new(
                device,
                size_state,
                size_action,
                &config.hidden_critic,
                config.activ_critic,
            )?;
            local.reset_parameters(rng)?;
            let target = local.duplicate()?;
            let optim = config.optim_critic.build(
                local.varmap().all_vars(),
                config.lr_critic,
                config.grad_clip_critic,
            )?;
            Ok((local, target, optim))
        };
        let (q1_local, q1_target, q1_optim) = make_critic(&mut rng)?;
        let (q2_local, q2_target, q2_optim) = make_critic(&mut rng)?;

        let temperature = if config.alpha_auto_tuning {
            Temperature::auto(size_action, config.optim_alpha, config.lr_alpha, device)?
        } else {
            Temperature::fixed(config.alpha)
        };

        Ok(Self {
            config: config.clone(),
            device: device.clone(),
            policy,
            policy_optim,
            q1_local,
            q1_target,
            q1_optim,
            q2_local,
            q2_target,
            q2_optim,
            temperature,
            rng,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.temperature.alpha()
    }

    pub fn policy(&self) -> &CategoricalPolicy {
        &self.policy
    }

    /// The critics in the order `(q1_local, q1_target, q2_local, q2_target)`.
    pub fn critics(&self) -> (&Critic, &Critic, &Critic, &Critic) {
        (&self.q1_local, &self.q1_target, &self.q2_local, &self.q2_target)
    }

    /// The entropy regularized TD target `r + gamma * (1 - done) * V(s')`,
    /// where `V(s') = sum_a pi(a|s') * (min(Q1', Q2')(s', a) - alpha * log pi(a|s'))`.
    ///
    /// The result is detached: it is a constant for the critic update.
    pub fn td_targets(
        &self,
        rewards: &Tensor,
        next_states: &Tensor,
        dones: &Tensor,
    ) -> Result<Tensor> {
        let (next_probs, next_log_probs) = self.policy.action_probs(next_states)?;
        let next_probs = next_probs.detach();
        let next_log_probs = next_log_probs.detach();

        let q1_next = self.q1_target.forward(next_states)?.detach();
        let q2_next = self.q2_target.forward(next_states)?.detach();
        let q_next = (q1_next.minimum(&q2_next)? - (next_log_probs * self.alpha())?)?;
        let v_next = (next_probs * q_next)?.sum_keepdim(1)?;

        let not_done = (1.0 - dones)?;
        let targets = (rewards + ((v_next * not_done)? * self.config.gamma)?)?;
        Ok(targets.detach())
    }

    /// One gradient step on both local critics followed by a soft update of
    /// their targets. Returns the larger of the two losses.
    pub fn update_q(
        &mut self,
        batch: &Batch,
    ) -> Result<f32> {
        let targets = self.td_targets(&batch.rewards, &batch.next_states, &batch.dones)?;

        let q1_expected = self.q1_local.forward(&batch.states)?.gather(&batch.actions, 1)?;
        let q2_expected = self.q2_local.forward(&batch.states)?.gather(&batch.actions, 1)?;

        let (q1_loss, q2_loss) = if self.config.use_huber_loss {
            (
                smooth_l1_loss(&q1_expected, &targets)?,
                smooth_l1_loss(&q2_expected, &targets)?,
            )
        } else {
            (mse(&q1_expected, &targets)?, mse(&q2_expected, &targets)?)
        };
        let value_loss = q1_loss.to_scalar::<f32>()?.max(q2_loss.to_scalar::<f32>()?);

        self.q1_optim.backward_step(&q1_loss)?;
        self.q2_optim.backward_step(&q2_loss)?;

        self.q1_target.track(&self.q1_local, self.config.tau)?;
        self.q2_target.track(&self.q2_local, self.config.tau)?;

        Ok(value_loss)
    }

    /// One gradient step on the policy.
    ///
    /// loss = mean_s sum_a pi(a|s) * (alpha * log pi(a|s) - min(Q1, Q2)(s, a))
    ///
    /// Returns the loss and the detached expected log-probability
    /// `sum_a pi(a|s) * log pi(a|s)` of every state, shape `(B, 1)`.
    pub fn update_policy(
        &mut self,
        states: &Tensor,
    ) -> Result<(f32, Tensor)> {
        let (probs, log_probs) = self.policy.action_probs(states)?;
        let expected_log_probs = (&probs * &log_probs)?.sum_keepdim(1)?;

        let q1 = self.q1_local.forward(states)?;
        let q2 = self.q2_local.forward(states)?;
        let q = q1.minimum(&q2)?.detach();

        let advantage = ((log_probs * self.alpha())? - q)?;
        let policy_loss = (probs * advantage)?.sum_keepdim(1)?.mean_all()?;

        self.policy_optim.backward_step(&policy_loss)?;

        Ok((policy_loss.to_scalar::<f32>()?, expected_log_probs.detach()))
    }

    /// One gradient step on the temperature when it is tuned automatically.
    pub fn try_update_alpha(
        &mut self,
        expected_log_probs: &Tensor,
    ) -> Result<()> {
        if let Some(loss) = self.temperature.update(expected_log_probs)? {
            trace!("alpha loss {loss:.4}, alpha is now {:.6}", self.alpha());
        }
        Ok(())
    }

    fn checkpoint_files(
        &self,
        path: &Path,
        name: &str,
    ) -> Vec<(&'static str, PathBuf)> {
        let mut files: Vec<(&'static str, PathBuf)> = [
            "policy",
            "q1_local",
            "q1_target",
            "q2_local",
            "q2_target",
        ]
        .into_iter()
        .map(|part| (part, path.join(format!("{name}_{part}.safetensors"))))
        .collect();
        if self.temperature.is_auto() {
            files.push(("log_alpha", path.join(format!("{name}_log_alpha.safetensors"))));
        }
        files
    }
}

impl Algorithm for SAC {
    type Config = SAC_Config;

    fn name(&self) -> &str {
        "SAC"
    }

    fn config(&self) -> &SAC_Config {
        &self.config
    }

    fn from_config(
        device: &Device,
        config: &SAC_Config,
        size_state: usize,
        size_action: usize,
    ) -> Result<Box<Self>> {
        Ok(Box::new(Self::new(device, config, size_state, size_action)?))
    }

    fn act(
        &mut self,
        state: &[f32],
        mode: RunMode,
    ) -> Result<usize> {
        // Candle assumes a batch dimension, so a single state becomes a
        // batch of one.
        let actions = match mode {
            RunMode::Train => self.policy.sample_action(state, &mut self.rng)?.actions,
            RunMode::Test => self.policy.greedy_action(state)?,
        };
        actions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("policy returned no action"))
    }

    fn learn(
        &mut self,
        transitions: &[&Transition],
    ) -> Result<Losses> {
        let batch = Batch::from_transitions(transitions, &self.device)?;

        trace!("update_q()");
        let value = self.update_q(&batch)?;

        trace!("update_policy()");
        let (policy, expected_log_probs) = self.update_policy(&batch.states)?;

        trace!("try_update_alpha()");
        self.try_update_alpha(&expected_log_probs)?;

        Ok(Losses { policy, value })
    }

    fn summary(&self) -> String {
        format!(
            concat!(
                "SAC [discrete] Agent:\n",
                "==========\n\n",
                "Policy Network:\n",
                "--------------\n",
                "{}\n\n",
                "Q Network:\n",
                "----------\n",
                "{}\n\n",
                "alpha: {:.4} ({})",
            ),
            self.policy.summary(),
            self.q1_local.summary(),
            self.alpha(),
            if self.temperature.is_auto() { "auto" } else { "fixed" },
        )
    }
}

impl SaveableAlgorithm for SAC {
    fn save<P: AsRef<Path> + ?Sized>(
        &self,
        path: &P,
        name: &str,
    ) -> Result<()> {
        std::fs::create_dir_all(path)?;
        for (part, file) in self.checkpoint_files(path.as_ref(), name) {
            match part {
                "policy" => self.policy.save(&file)?,
                "q1_local" => self.q1_local.save(&file)?,
                "q1_target" => self.q1_target.save(&file)?,
                "q2_local" => self.q2_local.save(&file)?,
                "q2_target" => self.q2_target.save(&file)?,
                _ => self.temperature.save(&file)?,
            }
        }
        info!("Saved {name} weights to {:?}", path.as_ref());
        Ok(())
    }

    fn load<P: AsRef<Path> + ?Sized>(
        &mut self,
        path: &P,
        name: &str,
    ) -> Result<()> {
        let files = self.checkpoint_files(path.as_ref(), name);
        if let Some((_, missing)) = files.iter().find(|(_, file)| !file.is_file()) {
            Err(SacError::MissingCheckpoint(missing.clone()))?
        }
        for (part, file) in files {
            match part {
                "policy" => self.policy.load(&file)?,
                "q1_local" => self.q1_local.load(&file)?,
                "q1_target" => self.q1_target.load(&file)?,
                "q2_local" => self.q2_local.load(&file)?,
                "q2_target" => self.q2_target.load(&file)?,
                _ => self.temperature.load(&file)?,
            }
        }
        info!("Loaded {name} weights from {:?}", path.as_ref());
        Ok(())
    }
}
