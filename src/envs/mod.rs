mod cartpole;

use anyhow::Result;

pub use cartpole::{
    CartPoleConfig,
    CartPoleEnv,
};


#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
}
impl Step {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// An episodic environment with a flat `f32` observation vector and
/// discrete actions in `0..action_size()`.
pub trait Environment {
    type Config;

    fn config(&self) -> &Self::Config;
    fn new(config: Self::Config) -> Result<Box<Self>>;
    fn reset(
        &mut self,
        seed: u64,
    ) -> Result<Vec<f32>>;
    fn step(
        &mut self,
        action: usize,
    ) -> Result<Step>;
    /// Release whatever the environment holds. Most environments hold nothing.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
    fn observation_size(&self) -> usize;
    fn action_size(&self) -> usize;
}
