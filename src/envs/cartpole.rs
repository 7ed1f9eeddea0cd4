use {
    super::{
        Environment,
        Step,
    },
    anyhow::{
        anyhow,
        Result,
    },
    rand::{
        rngs::StdRng,
        Rng,
        SeedableRng,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    tracing::trace,
};


const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
// half the pole's length
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
// seconds between state updates
const TAU: f64 = 0.02;

const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
const X_THRESHOLD: f64 = 2.4;


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    // Episodes are truncated after this many steps.
    pub timelimit: usize,
}
impl Default for CartPoleConfig {
    fn default() -> Self {
        Self { timelimit: 200 }
    }
}


/// The classic cart-pole balancing task.
///
/// The state is `(x, x_dot, theta, theta_dot)`, action `0` pushes the cart to
/// the left and `1` to the right. Every step is rewarded with `1.0`, including
/// the one that tips the pole over or moves the cart off the track.
pub struct CartPoleEnv {
    config: CartPoleConfig,
    state: [f64; 4],
    timestep: usize,
    // set once an episode is over, until the next reset
    done: bool,
    rng: StdRng,
}

impl CartPoleEnv {
    pub fn state(&self) -> [f64; 4] {
        self.state
    }

    fn observation(&self) -> Vec<f32> {
        self.state.iter().map(|&s| s as f32).collect()
    }
}

impl Environment for CartPoleEnv {
    type Config = CartPoleConfig;

    fn config(&self) -> &CartPoleConfig {
        &self.config
    }

    fn new(config: CartPoleConfig) -> Result<Box<Self>> {
        if config.timelimit == 0 {
            Err(anyhow!("CartPole timelimit must be positive"))?
        }
        Ok(Box::new(Self {
            config,
            state: [0.0; 4],
            timestep: 0,
            done: true,
            rng: StdRng::seed_from_u64(0),
        }))
    }

    fn reset(
        &mut self,
        seed: u64,
    ) -> Result<Vec<f32>> {
        self.rng = StdRng::seed_from_u64(seed);
        for s in self.state.iter_mut() {
            *s = self.rng.gen_range(-0.05..0.05);
        }
        self.timestep = 0;
        self.done = false;
        Ok(self.observation())
    }

    fn step(
        &mut self,
        action: usize,
    ) -> Result<Step> {
        if self.done {
            Err(anyhow!("CartPole stepped after the episode ended, call reset first"))?
        }
        let force = match action {
            0 => -FORCE_MAG,
            1 => FORCE_MAG,
            _ => Err(anyhow!("invalid CartPole action {action}, expected 0 or 1"))?,
        };

        let [x, x_dot, theta, theta_dot] = self.state;
        let (sin, cos) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot.powi(2) * sin) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin - cos * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos.powi(2) / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos / TOTAL_MASS;

        // explicit euler
        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.timestep += 1;

        let [x, _, theta, _] = self.state;
        let terminated = x.abs() > X_THRESHOLD || theta.abs() > THETA_THRESHOLD;
        let truncated = !terminated && self.timestep >= self.config.timelimit;
        self.done = terminated || truncated;

        trace!("CartPole step {}: {:?}", self.timestep, self.state);

        Ok(Step {
            observation: self.observation(),
            reward: 1.0,
            terminated,
            truncated,
        })
    }

    fn observation_size(&self) -> usize {
        4
    }

    fn action_size(&self) -> usize {
        2
    }
}
