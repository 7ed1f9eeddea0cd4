use {
    super::{
        mlp::{
            build_mlp,
            layer_dims,
            reset_parameters,
            Activation,
        },
        policy::{
            describe,
            StateBatch,
        },
        soft_update::soft_update,
    },
    crate::error::SacError,
    anyhow::Result,
    candle_core::{
        Device,
        Module,
        Tensor,
    },
    candle_nn::{
        Sequential,
        VarMap,
    },
    rand::Rng,
    std::path::Path,
    tracing::info,
};


/// A Q-network that maps a state to one value estimate per discrete action.
pub struct Critic {
    varmap: VarMap,
    network: Sequential,
    dims: Vec<(usize, usize)>,
    activation: Activation,
    device: Device,
}

impl Critic {
    pub fn new(
        device: &Device,
        size_state: usize,
        size_action: usize,
        hidden: &[usize],
        activation: Activation,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let dims = layer_dims(size_state, hidden, size_action);
        let network = build_mlp(&varmap, device, "critic", &dims, activation)?;
        Ok(Self {
            varmap,
            network,
            dims,
            activation,
            device: device.clone(),
        })
    }

    /// A new critic with the same layout and identical parameter values.
    pub fn duplicate(&self) -> Result<Self> {
        let size_state = self.dims.first().map_or(0, |d| d.0);
        let size_action = self.dims.last().map_or(0, |d| d.1);
        let hidden: Vec<usize> = self.dims.iter().skip(1).map(|d| d.0).collect();
        let copy = Self::new(&self.device, size_state, size_action, &hidden, self.activation)?;

        // this sets the two networks to be equal to each other using tau = 1.0
        soft_update(&self.varmap, &copy.varmap, 1.0)?;
        Ok(copy)
    }

    pub fn reset_parameters<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<()> {
        reset_parameters(&self.varmap, "critic", &self.dims, rng)
    }

    /// Q-values for every action, shape `(B, A)`.
    pub fn forward<S: StateBatch + ?Sized>(
        &self,
        state: &S,
    ) -> Result<Tensor> {
        Ok(self.network.forward(&state.to_batch(&self.device)?)?)
    }

    /// Move the parameters of `self` toward those of `local`.
    pub fn track(
        &self,
        local: &Critic,
        tau: f64,
    ) -> Result<()> {
        soft_update(&local.varmap, &self.varmap, tau)
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn summary(&self) -> String {
        describe("Critic", &self.dims, self.activation)
    }

    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Saved critic to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<()> {
        if !path.as_ref().is_file() {
            Err(SacError::MissingCheckpoint(path.as_ref().to_path_buf()))?
        }
        self.varmap.load(&path)?;
        info!("Loaded critic from {:?}", path.as_ref());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{
            rngs::StdRng,
            SeedableRng,
        },
    };

    #[test]
    fn outputs_one_value_per_action() -> Result<()> {
        let critic = Critic::new(&Device::Cpu, 4, 2, &[32, 32], Activation::Relu)?;
        let states = vec![vec![0f32; 4], vec![1f32; 4], vec![-1f32; 4]];
        assert_eq!(critic.forward(states.as_slice())?.dims(), &[3, 2]);
        Ok(())
    }

    #[test]
    fn duplicate_matches_original() -> Result<()> {
        let critic = Critic::new(&Device::Cpu, 3, 4, &[8], Activation::Tanh)?;
        critic.reset_parameters(&mut StdRng::seed_from_u64(5))?;
        let copy = critic.duplicate()?;

        let state = vec![0.2f32, -0.4, 0.8];
        assert_eq!(
            critic.forward(&state)?.to_vec2::<f32>()?,
            copy.forward(&state)?.to_vec2::<f32>()?,
        );
        Ok(())
    }

    #[test]
    fn independently_initialized_critics_differ() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(11);
        let q1 = Critic::new(&Device::Cpu, 3, 2, &[8], Activation::Relu)?;
        let q2 = Critic::new(&Device::Cpu, 3, 2, &[8], Activation::Relu)?;
        q1.reset_parameters(&mut rng)?;
        q2.reset_parameters(&mut rng)?;

        let state = vec![0.5f32, 0.5, 0.5];
        assert_ne!(
            q1.forward(&state)?.to_vec2::<f32>()?,
            q2.forward(&state)?.to_vec2::<f32>()?,
        );
        Ok(())
    }
}
