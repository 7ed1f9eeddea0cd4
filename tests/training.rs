use {
    anyhow::Result,
    candle_core::Device,
    sac_discrete::{
        agents::{
            Agent,
            SAC,
        },
        configs::{
            SAC_Config,
            TrainConfig,
        },
        engine::{
            run_n,
            train,
        },
        envs::{
            CartPoleConfig,
            CartPoleEnv,
            Environment,
            Step,
        },
    },
    std::{
        io::Write,
        sync::{
            Arc,
            Mutex,
        },
    },
    tempdir::TempDir,
    tracing::Level,
};


/// Every action earns the maximum reward of 1, episodes last `length` steps.
/// With `rewarded_episodes` set, episodes after that many resets earn nothing.
struct ConstantEnv {
    length: usize,
    timestep: usize,
    resets: usize,
    rewarded_episodes: Option<usize>,
    closed: bool,
}

impl Environment for ConstantEnv {
    type Config = usize;

    fn config(&self) -> &usize {
        &self.length
    }

    fn new(length: usize) -> Result<Box<Self>> {
        Ok(Box::new(Self {
            length,
            timestep: 0,
            resets: 0,
            rewarded_episodes: None,
            closed: false,
        }))
    }

    fn reset(
        &mut self,
        _seed: u64,
    ) -> Result<Vec<f32>> {
        self.timestep = 0;
        self.resets += 1;
        Ok(vec![0.0, 1.0])
    }

    fn step(
        &mut self,
        _action: usize,
    ) -> Result<Step> {
        self.timestep += 1;
        let paid = self.rewarded_episodes.map_or(true, |n| self.resets <= n);
        Ok(Step {
            observation: vec![self.timestep as f32 / self.length as f32, 1.0],
            reward: if paid { 1.0 } else { 0.0 },
            terminated: false,
            truncated: self.timestep >= self.length,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn observation_size(&self) -> usize {
        2
    }

    fn action_size(&self) -> usize {
        3
    }
}

/// Shared in-memory sink for the lines of a scoped subscriber.
#[derive(Clone, Default)]
struct LogSink(Arc<Mutex<Vec<u8>>>);

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with warnings captured, returning its result and the log text.
fn with_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let sink = LogSink::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(Level::WARN)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&sink.0.lock().unwrap()).into_owned();
    (out, logs)
}

fn small_config() -> SAC_Config {
    SAC_Config {
        seed: 11,
        buffer_size: 1000,
        batch_size: 4,
        hidden_actor: vec![16],
        hidden_critic: vec![16],
        ..Default::default()
    }
}

#[test]
fn maximum_reward_environment_is_solved_after_evaluation() -> Result<()> {
    let dir = TempDir::new("sac_solved")?;
    let mut env = *ConstantEnv::new(5)?;
    let mut agent = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 2, 3)?;
    let config = TrainConfig {
        num_episodes: 10,
        max_steps: 5,
        env_solved: Some(5.0),
        times_solved: 3,
        log_every: 1,
        ..Default::default()
    };

    let report = train(&mut env, &mut agent, &config, Some(dir.path()))?;

    assert!(report.solved);
    assert_eq!(report.episodes, 1);
    assert_eq!(report.scores, vec![5.0]);
    assert_eq!(report.eval_score, Some(5.0));
    assert_eq!(report.best_score, 5.0);
    assert!(env.closed);

    // the buffer exceeded the batch size on the last step
    assert_eq!(agent.memory().len(), 5);
    assert_eq!(agent.policy_losses().len(), 1);
    assert!(dir.path().join("SAC_policy.safetensors").is_file());
    assert!(dir.path().join("SAC_log_alpha.safetensors").is_file());
    Ok(())
}

#[test]
fn cut_off_episodes_score_the_max_steps_reward() -> Result<()> {
    let mut env = *ConstantEnv::new(1000)?;
    let mut agent = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 2, 3)?;
    let config = TrainConfig {
        num_episodes: 2,
        max_steps: 5,
        max_steps_reward: Some(-10.0),
        times_solved: 2,
        ..Default::default()
    };

    let report = train(&mut env, &mut agent, &config, None)?;

    assert!(!report.solved);
    assert_eq!(report.episodes, 2);
    assert_eq!(report.eval_score, None);
    assert_eq!(report.scores, vec![-6.0, -6.0]);

    // stored transitions keep the reward of the environment
    assert!(agent.memory().iter().all(|t| t.reward() == 1.0 && !t.done()));
    Ok(())
}

#[test]
fn failed_evaluation_keeps_training() -> Result<()> {
    let mut env = *ConstantEnv::new(5)?;
    // only the first episode pays, so the greedy evaluation right after it fails
    env.rewarded_episodes = Some(1);
    let mut agent = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 2, 3)?;
    let config = TrainConfig {
        num_episodes: 3,
        max_steps: 5,
        env_solved: Some(5.0),
        times_solved: 2,
        ..Default::default()
    };

    let report = train(&mut env, &mut agent, &config, None)?;

    assert!(!report.solved);
    assert_eq!(report.episodes, 3);
    assert_eq!(report.eval_score, Some(0.0));
    assert_eq!(report.scores, vec![5.0, 0.0, 0.0]);
    assert_eq!(report.best_score, 5.0);
    Ok(())
}

#[test]
fn cartpole_trains_and_reloads() -> Result<()> {
    let dir = TempDir::new("sac_cartpole")?;
    let mut env = *CartPoleEnv::new(CartPoleConfig { timelimit: 50 })?;
    let mut agent = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 4, 2)?;
    let config = TrainConfig {
        num_episodes: 3,
        max_steps: 50,
        env_solved: None,
        times_solved: 3,
        ..TrainConfig::cartpole()
    };

    let report = train(&mut env, &mut agent, &config, Some(dir.path()))?;
    assert_eq!(report.episodes, 3);
    assert!(report.scores.iter().all(|&s| (1.0..=50.0).contains(&s)));

    let mut restored = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 4, 2)?;
    restored.load_weights(dir.path())?;
    Ok(())
}

#[test]
fn experiments_are_never_overwritten() -> Result<()> {
    let dir = TempDir::new("sac_experiment")?;
    let path = dir.path().join("cartpole");
    let mut env = *CartPoleEnv::new(CartPoleConfig { timelimit: 20 })?;
    let train_config = TrainConfig {
        num_episodes: 2,
        max_steps: 20,
        env_solved: None,
        times_solved: 2,
        ..Default::default()
    };

    let reports = run_n::<SAC, _>(&path, 2, &mut env, &small_config(), &train_config, &Device::Cpu)?;
    assert_eq!(reports.len(), 2);
    for file in [
        "config_algorithm.ron",
        "config_environment.ron",
        "config_train.ron",
        "run_0_data.parquet",
        "run_1_data.parquet",
    ] {
        assert!(path.join(file).is_file(), "{file}");
    }
    assert!(path.join("run_1").join("SAC_q2_target.safetensors").is_file());

    assert!(run_n::<SAC, _>(&path, 1, &mut env, &small_config(), &train_config, &Device::Cpu).is_err());
    Ok(())
}

#[test]
fn failed_evaluation_reports_elapsed_time() -> Result<()> {
    let mut env = *ConstantEnv::new(5)?;
    env.rewarded_episodes = Some(1);
    let mut agent = Agent::<SAC>::from_config(&Device::Cpu, &small_config(), 2, 3)?;
    let config = TrainConfig {
        num_episodes: 1,
        max_steps: 5,
        env_solved: Some(5.0),
        times_solved: 2,
        ..Default::default()
    };

    let (report, logs) = with_warnings(|| train(&mut env, &mut agent, &config, None));

    assert!(!report?.solved);
    let failure = logs
        .find("No success")
        .expect("the failed evaluation is logged");
    assert!(logs[failure..].contains("Time elapsed: 00:00:"), "{logs}");
    Ok(())
}

#[test]
fn every_run_logs_the_agent_summary() -> Result<()> {
    let dir = TempDir::new("sac_summary")?;
    let path = dir.path().join("cartpole");
    let mut env = *CartPoleEnv::new(CartPoleConfig { timelimit: 10 })?;
    let train_config = TrainConfig {
        num_episodes: 1,
        max_steps: 10,
        env_solved: None,
        times_solved: 1,
        ..Default::default()
    };

    let (reports, logs) = with_warnings(|| {
        run_n::<SAC, _>(&path, 2, &mut env, &small_config(), &train_config, &Device::Cpu)
    });

    assert_eq!(reports?.len(), 2);
    assert_eq!(logs.matches("SAC [discrete] Agent").count(), 2, "{logs}");
    assert!(logs.contains("Policy Network"));
    Ok(())
}
