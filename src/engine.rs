use {
    crate::{
        agents::{
            Agent,
            Algorithm,
            RunMode,
            SaveableAlgorithm,
        },
        configs::{
            OffPolicyConfig,
            TrainConfig,
        },
        envs::Environment,
        util::{
            format_elapsed,
            write_config,
        },
    },
    anyhow::{
        anyhow,
        Result,
    },
    candle_core::Device,
    polars::prelude::{
        DataFrame,
        NamedFrom,
        ParquetWriter,
        Series,
    },
    rand::{
        rngs::StdRng,
        Rng,
        SeedableRng,
    },
    serde::Serialize,
    std::{
        collections::VecDeque,
        fs::{
            create_dir_all,
            File,
        },
        path::Path,
        time::{
            Duration,
            Instant,
        },
    },
    tracing::{
        info,
        warn,
    },
};


/// Scores of all episodes, their running average over a fixed window and the
/// best running average seen so far.
#[derive(Clone, Debug)]
pub struct ScoreTracker {
    window: VecDeque<f64>,
    window_size: usize,
    scores: Vec<f64>,
    best: f64,
}

impl ScoreTracker {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            scores: Vec::new(),
            best: f64::NEG_INFINITY,
        }
    }

    /// Record the score of an episode and return the new window average.
    pub fn push(
        &mut self,
        score: f64,
    ) -> f64 {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(score);
        self.scores.push(score);
        self.average()
    }

    pub fn average(&self) -> f64 {
        mean(self.window.iter().copied())
    }

    /// Whether the current average beats the best one so far, which then
    /// becomes the new best.
    pub fn improved(&mut self) -> bool {
        let average = self.average();
        if average > self.best {
            self.best = average;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

/// The outcome of [`train`].
#[derive(Clone, Debug)]
pub struct TrainReport {
    pub scores: Vec<f64>,
    pub solved: bool,
    pub episodes: usize,
    // The result of the last evaluation, if one ran.
    pub eval_score: Option<f64>,
    pub best_score: f64,
    pub elapsed: Duration,
}

/// Arithmetic mean, NaN when empty.
fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Run a full training session.
///
/// Every episode the agent acts, stores and learns until the environment ends
/// the episode or `max_steps` is reached. Whenever the running average improves
/// the weights are saved into `checkpoint_dir` (if given). Once the running
/// average reaches `env_solved` a greedy evaluation over `times_solved`
/// episodes decides whether training stops early.
pub fn train<Alg, Env>(
    env: &mut Env,
    agent: &mut Agent<Alg>,
    config: &TrainConfig,
    checkpoint_dir: Option<&Path>,
) -> Result<TrainReport>
where
    Alg: Algorithm + SaveableAlgorithm,
    Alg::Config: OffPolicyConfig,
    Env: Environment,
{
    config.validate()?;
    warn!("observation size: {}", env.observation_size());
    warn!("action size: {}", env.action_size());

    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(agent.algorithm().config().seed());
    let mut tracker = ScoreTracker::new(config.times_solved);
    let mut solved = false;
    let mut eval_score = None;
    let mut episodes = 0;

    for episode in 1..=config.num_episodes {
        episodes = episode;
        agent.reset_losses();
        let mut state = env.reset(rng.gen::<u64>())?;
        let mut score = 0.0;

        for time_step in 1..=config.max_steps {
            let action = agent.act(&state, RunMode::Train)?;
            let step = env.step(action)?;
            let done = step.done();

            agent.step(&state, action, step.reward as f32, &step.observation, done)?;

            // A cut off episode may count with a different reward.
            score += match config.max_steps_reward {
                Some(reward) if !done && time_step == config.max_steps => reward,
                _ => step.reward,
            };
            state = step.observation;

            if done {
                break;
            }
        }

        let average = tracker.push(score);
        let line = format!(
            "Episode {episode}\tScore: {score:5.2}\tAvg Score: {average:5.2}\tAvg Policy Loss: {:5.2}\tAvg Value Loss: {:5.2}",
            mean(agent.policy_losses().iter().map(|&l| l as f64)),
            mean(agent.value_losses().iter().map(|&l| l as f64)),
        );
        if episode % config.log_every == 0 {
            warn!("{line}");
        } else {
            info!("{line}");
        }

        if tracker.improved() {
            if let Some(dir) = checkpoint_dir {
                agent.save_weights(dir)?;
            }
        }

        if let Some(threshold) = config.env_solved {
            if average >= threshold {
                warn!("Running evaluation...");
                let score = evaluate(env, agent, config.times_solved, config.max_steps, &mut rng)?;
                eval_score = Some(score);

                if score >= threshold {
                    warn!("Environment solved {} times consecutively!", config.times_solved);
                    warn!("Avg score: {score:.3}");
                    warn!("Time elapsed: {}", format_elapsed(start.elapsed()));
                    solved = true;
                    break;
                }
                warn!("No success. Avg score: {score:.3}");
                warn!("Time elapsed: {}", format_elapsed(start.elapsed()));
            }
        }
    }

    env.close()?;

    Ok(TrainReport {
        scores: tracker.scores().to_vec(),
        solved,
        episodes,
        eval_score,
        best_score: tracker.best(),
        elapsed: start.elapsed(),
    })
}

/// Average score of `episodes` greedy episodes, each at most `max_steps` long.
/// Nothing is stored and nothing is learned.
pub fn evaluate<Alg, Env, R>(
    env: &mut Env,
    agent: &mut Agent<Alg>,
    episodes: usize,
    max_steps: usize,
    rng: &mut R,
) -> Result<f64>
where
    Alg: Algorithm,
    Alg::Config: OffPolicyConfig,
    Env: Environment,
    R: Rng + ?Sized,
{
    if episodes == 0 {
        Err(anyhow!("evaluation needs at least one episode"))?
    }

    let mut total_reward = 0.0;
    for _ in 0..episodes {
        let mut state = env.reset(rng.gen::<u64>())?;
        for _ in 0..max_steps {
            let action = agent.act(&state, RunMode::Test)?;
            let step = env.step(action)?;
            total_reward += step.reward;
            if step.done() {
                break;
            }
            state = step.observation;
        }
    }
    Ok(total_reward / episodes as f64)
}

/// Train `n_runs` fresh agents and collect their scores.
///
/// The configs are written to `path` as RON, the scores of run `n` to
/// `run_{n}_data.parquet` and its best weights to `run_{n}/`. An existing
/// experiment in `path` is never overwritten.
pub fn run_n<Alg, Env>(
    path: &Path,
    n_runs: usize,
    env: &mut Env,
    config: &Alg::Config,
    train_config: &TrainConfig,
    device: &Device,
) -> Result<Vec<TrainReport>>
where
    Alg: Algorithm + SaveableAlgorithm,
    Alg::Config: Clone + Serialize + OffPolicyConfig,
    Env: Environment,
    Env::Config: Serialize,
{
    if path.join("config_algorithm.ron").try_exists()? {
        Err(anyhow!(concat!(
            "Algorithm config already exists in this directory!\n",
            "I am assuming I would be overwriting existing data!",
        )))?
    }

    create_dir_all(path)?;
    write_config(config, path.join("config_algorithm.ron"))?;
    write_config(env.config(), path.join("config_environment.ron"))?;
    write_config(train_config, path.join("config_train.ron"))?;

    let mut reports = Vec::with_capacity(n_runs);
    for n in 0..n_runs {
        warn!("Collecting data, run {n}/{n_runs}");

        // every run gets its own seed
        let mut config = config.clone();
        config.set_seed(config.seed().wrapping_add(n as u64));

        let mut agent = Agent::<Alg>::from_config(
            device,
            &config,
            env.observation_size(),
            env.action_size(),
        )?;
        warn!("{}", agent.summary());
        let checkpoint_dir = path.join(format!("run_{n}"));
        let report = train(env, &mut agent, train_config, Some(checkpoint_dir.as_path()))?;
        warn!(
            "Run {n} finished after {} episodes, solved: {}, best average: {:.3}",
            report.episodes, report.solved, report.best_score,
        );

        let mut df = DataFrame::new(vec![
            Series::new(
                &format!("run_{n}_scores"),
                &report.scores,
            ),
        ])?;

        ParquetWriter::new(
            File::create(path.join(format!("run_{n}_data.parquet")))?
        ).finish(&mut df)?;

        reports.push(report);
    }
    Ok(reports)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_keeps_a_sliding_window() {
        let mut tracker = ScoreTracker::new(3);
        assert!(tracker.average().is_nan());
        assert_eq!(tracker.push(1.0), 1.0);
        assert_eq!(tracker.push(2.0), 1.5);
        assert_eq!(tracker.push(3.0), 2.0);
        assert_eq!(tracker.push(7.0), 4.0);
        assert_eq!(tracker.scores(), &[1.0, 2.0, 3.0, 7.0]);
    }

    #[test]
    fn tracker_reports_only_improvements() {
        let mut tracker = ScoreTracker::new(2);
        tracker.push(5.0);
        assert!(tracker.improved());
        assert!(!tracker.improved());
        tracker.push(1.0);
        assert!(!tracker.improved());
        tracker.push(10.0);
        assert!(tracker.improved());
        assert_eq!(tracker.best(), 5.5);
    }

    #[test]
    fn empty_mean_is_nan() {
        assert!(mean(std::iter::empty()).is_nan());
        assert_eq!(mean([1.0, 2.0]), 1.5);
    }
}
