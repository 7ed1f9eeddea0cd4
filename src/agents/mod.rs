mod sac;

pub use sac::SAC;


use {
    crate::{
        components::{
            ReplayBuffer,
            Transition,
        },
        configs::OffPolicyConfig,
    },
    anyhow::Result,
    candle_core::Device,
    rand::{
        rngs::StdRng,
        SeedableRng,
    },
    std::{
        fmt::Display,
        path::Path,
    },
    tracing::debug,
};


/// The execution mode of an agent is either training or testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Train,
    Test,
}

impl Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Train => write!(f, "Train"),
            RunMode::Test => write!(f, "Test"),
        }
    }
}

/// The losses of one learning update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Losses {
    pub policy: f32,
    pub value: f32,
}

/// An off-policy algorithm that acts on single states and learns from
/// batches of transitions.
pub trait Algorithm {
    type Config;

    fn name(&self) -> &str;
    fn config(&self) -> &Self::Config;
    fn from_config(
        device: &Device,
        config: &Self::Config,
        size_state: usize,
        size_action: usize,
    ) -> Result<Box<Self>>;

    /// Select an action for a single state. In [`RunMode::Train`] the
    /// algorithm explores, in [`RunMode::Test`] it acts greedily.
    fn act(
        &mut self,
        state: &[f32],
        mode: RunMode,
    ) -> Result<usize>;

    /// One full update on a batch of transitions.
    fn learn(
        &mut self,
        transitions: &[&Transition],
    ) -> Result<Losses>;

    /// A description of the networks of the algorithm.
    fn summary(&self) -> String;
}

pub trait SaveableAlgorithm {
    fn save<P: AsRef<Path> + ?Sized>(
        &self,
        path: &P,
        name: &str,
    ) -> Result<()>;

    fn load<P: AsRef<Path> + ?Sized>(
        &mut self,
        path: &P,
        name: &str,
    ) -> Result<()>;
}

/// The agent shell around an algorithm.
///
/// It owns the replay buffer and decides when the algorithm learns: every
/// `update_every` steps, once the buffer holds more than `batch_size`
/// transitions, it runs `num_updates` sample-and-learn cycles.
pub struct Agent<Alg> {
    algorithm: Alg,
    memory: ReplayBuffer,
    batch_size: usize,
    update_every: usize,
    num_updates: usize,
    t_step: usize,
    rng: StdRng,
    policy_losses: Vec<f32>,
    value_losses: Vec<f32>,
}

impl<Alg> Agent<Alg>
where
    Alg: Algorithm,
    Alg::Config: OffPolicyConfig,
{
    pub fn new(algorithm: Alg) -> Self {
        let config = algorithm.config();
        Self {
            memory: ReplayBuffer::new(config.replay_buffer_capacity()),
            batch_size: config.training_batch_size(),
            update_every: config.update_every().max(1),
            num_updates: config.num_updates(),
            t_step: 0,
            // offset the stream so sampling does not mirror the algorithm's rng
            rng: StdRng::seed_from_u64(config.seed().wrapping_add(1)),
            policy_losses: Vec::new(),
            value_losses: Vec::new(),
            algorithm,
        }
    }

    pub fn from_config(
        device: &Device,
        config: &Alg::Config,
        size_state: usize,
        size_action: usize,
    ) -> Result<Self> {
        Ok(Self::new(*Alg::from_config(device, config, size_state, size_action)?))
    }

    pub fn act(
        &mut self,
        state: &[f32],
        mode: RunMode,
    ) -> Result<usize> {
        self.algorithm.act(state, mode)
    }

    /// Store a transition and maybe learn from the replay buffer.
    pub fn step(
        &mut self,
        state: &[f32],
        action: usize,
        reward: f32,
        next_state: &[f32],
        done: bool,
    ) -> Result<()> {
        self.memory.add(Transition::new(state, action, reward, next_state, done));
        self.sample_and_learn()
    }

    fn sample_and_learn(&mut self) -> Result<()> {
        self.t_step = (self.t_step + 1) % self.update_every;
        if self.t_step != 0 || self.memory.len() <= self.batch_size {
            return Ok(());
        }

        for _ in 0..self.num_updates {
            let transitions = self.memory.sample(self.batch_size, &mut self.rng)?;
            let losses = self.algorithm.learn(&transitions)?;
            debug!(
                "Learned with policy loss {:.4} and value loss {:.4}",
                losses.policy, losses.value,
            );
            self.policy_losses.push(losses.policy);
            self.value_losses.push(losses.value);
        }
        Ok(())
    }

    /// Clear the per-episode loss statistics.
    pub fn reset_losses(&mut self) {
        self.policy_losses.clear();
        self.value_losses.clear();
    }

    pub fn policy_losses(&self) -> &[f32] {
        &self.policy_losses
    }

    pub fn value_losses(&self) -> &[f32] {
        &self.value_losses
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    pub fn algorithm(&self) -> &Alg {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut Alg {
        &mut self.algorithm
    }

    pub fn summary(&self) -> String {
        self.algorithm.summary()
    }
}

impl<Alg> Agent<Alg>
where
    Alg: Algorithm + SaveableAlgorithm,
{
    pub fn save_weights<P: AsRef<Path> + ?Sized>(
        &self,
        path: &P,
    ) -> Result<()> {
        self.algorithm.save(path, self.algorithm.name())
    }

    pub fn load_weights<P: AsRef<Path> + ?Sized>(
        &mut self,
        path: &P,
    ) -> Result<()> {
        let name = self.algorithm.name().to_owned();
        self.algorithm.load(path, &name)
    }
}
