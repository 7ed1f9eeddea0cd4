use {
    crate::error::SacError,
    serde::{
        Deserialize,
        Serialize,
    },
};


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    // The maximum number of episodes.
    pub num_episodes: usize,
    // Episodes are cut off after this many steps.
    pub max_steps: usize,
    // Reward counted toward the score when an episode is cut off.
    pub max_steps_reward: Option<f64>,
    // Average score over the last `times_solved` episodes that triggers the
    // evaluation. Without a threshold training always runs all episodes.
    pub env_solved: Option<f64>,
    // Window size of the running average, and the number of evaluation episodes.
    pub times_solved: usize,
    // Echo a full line every `log_every` episodes.
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_episodes: 2000,
            max_steps: 2000,
            max_steps_reward: None,
            env_solved: None,
            times_solved: 100,
            log_every: 100,
        }
    }
}

impl TrainConfig {
    pub fn cartpole() -> Self {
        Self {
            env_solved: Some(195.0),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SacError> {
        if self.max_steps == 0 {
            return Err(SacError::InvalidConfig("max_steps must be positive".into()));
        }
        if self.times_solved == 0 {
            return Err(SacError::InvalidConfig("times_solved must be positive".into()));
        }
        if self.log_every == 0 {
            return Err(SacError::InvalidConfig("log_every must be positive".into()));
        }
        Ok(())
    }
}
