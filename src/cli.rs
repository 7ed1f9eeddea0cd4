use {
    crate::{
        agents::{
            Agent,
            SAC,
        },
        configs::{
            SAC_Config,
            TrainConfig,
        },
        engine::{
            evaluate,
            run_n,
            train,
        },
        envs::{
            CartPoleEnv,
            Environment,
        },
        logging::setup_logging,
        util::{
            format_elapsed,
            read_config,
        },
    },
    anyhow::{
        anyhow,
        Result,
    },
    candle_core::Device,
    clap::{
        Parser,
        ValueEnum,
    },
    rand::{
        rngs::StdRng,
        SeedableRng,
    },
    std::path::{
        Path,
        PathBuf,
    },
    tracing::{
        warn,
        Level,
    },
};


#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DeviceKind {
    Cpu,
    Cuda,
}
impl DeviceKind {
    pub fn device(&self) -> Result<Device> {
        Ok(match self {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda => Device::new_cuda(0)?,
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Loglevel {
    Error, // put these only during active debugging and then downgrade later
    Warn,  // main events in the program
    Info,  // all the little details
    None,  // don't log anything
}
impl Loglevel {
    pub fn level(&self) -> Option<Level> {
        match self {
            Loglevel::Error => Some(Level::ERROR),
            Loglevel::Warn => Some(Level::WARN),
            Loglevel::Info => Some(Level::INFO),
            Loglevel::None => None,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The device to run the networks on.
    #[arg(long, value_enum, default_value_t=DeviceKind::Cpu)]
    pub device: DeviceKind,

    /// Setup logging
    #[arg(long, value_enum, default_value_t=Loglevel::None)]
    pub log: Loglevel,

    /// Name of the experiment, results go to `data/<name>/`.
    #[arg(long, default_value = "cartpole")]
    pub name: String,

    /// RON file with the algorithm config, the CartPole preset otherwise.
    #[arg(long)]
    pub alg_config: Option<PathBuf>,

    /// RON file with the training loop config, the CartPole preset otherwise.
    #[arg(long)]
    pub train_config: Option<PathBuf>,

    /// Directory with saved weights to start from.
    #[arg(long)]
    pub load_model: Option<PathBuf>,

    /// How many independent agents to train.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    /// Only evaluate the loaded weights, without any training.
    #[arg(long)]
    pub eval_only: bool,
}

/// Set up logging and run the requested CartPole experiment.
pub fn run(args: Args) -> Result<()> {
    if let Some(level) = args.log.level() {
        setup_logging(format!("{}.log", args.name), Some(level), Some(level))?;
    }

    let device = args.device.device()?;
    let config = match &args.alg_config {
        Some(path) => read_config(path)?,
        None => SAC_Config::cartpole(),
    };
    let train_config = match &args.train_config {
        Some(path) => read_config(path)?,
        None => TrainConfig::cartpole(),
    };
    let mut env = *CartPoleEnv::new(Default::default())?;
    let path = Path::new("data/").join(&args.name);

    match (&args.load_model, args.eval_only) {
        (None, true) => Err(anyhow!("--eval-only needs weights from --load-model"))?,
        (None, false) => {
            run_n::<SAC, _>(&path, args.runs, &mut env, &config, &train_config, &device)?;
        }
        (Some(weights), eval_only) => {
            let mut agent = Agent::<SAC>::from_config(
                &device,
                &config,
                env.observation_size(),
                env.action_size(),
            )?;
            agent.load_weights(weights)?;
            warn!("{}", agent.summary());

            if eval_only {
                let mut rng = StdRng::seed_from_u64(config.seed);
                let score = evaluate(
                    &mut env,
                    &mut agent,
                    train_config.times_solved,
                    train_config.max_steps,
                    &mut rng,
                )?;
                env.close()?;
                warn!("Evaluation over {} episodes, avg score: {score:.3}", train_config.times_solved);
            } else {
                let report = train(&mut env, &mut agent, &train_config, Some(path.as_path()))?;
                warn!(
                    "Finished after {} episodes in {}, solved: {}",
                    report.episodes,
                    format_elapsed(report.elapsed),
                    report.solved,
                );
            }
        }
    }
    Ok(())
}
