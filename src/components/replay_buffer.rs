use {
    crate::error::SacError,
    candle_core::{
        Device,
        Result,
        Tensor,
    },
    rand::{
        seq::index,
        Rng,
    },
    std::collections::VecDeque,
    unzip_n::unzip_n,
};

unzip_n!(5);

/// A transition in the replay buffer.
///
/// # Fields
///
/// * `state` - The observed state.
/// * `action` - The index of the discrete action taken.
/// * `reward` - The reward received for the action.
/// * `next_state` - The state the environment moved to.
/// * `done` - Whether the episode ended with this transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    state: Vec<f32>,
    action: usize,
    reward: f32,
    next_state: Vec<f32>,
    done: bool,
}
impl Transition {
    pub fn new(
        state: &[f32],
        action: usize,
        reward: f32,
        next_state: &[f32],
        done: bool,
    ) -> Self {
        Self {
            state: state.to_vec(),
            action,
            reward,
            next_state: next_state.to_vec(),
            done,
        }
    }

    pub fn state(&self) -> &[f32] {
        &self.state
    }

    pub fn action(&self) -> usize {
        self.action
    }

    pub fn reward(&self) -> f32 {
        self.reward
    }

    pub fn next_state(&self) -> &[f32] {
        &self.next_state
    }

    pub fn done(&self) -> bool {
        self.done
    }
}

/// A replay buffer for off-policy algorithms.
///
/// The replay buffer is implemented as a simple ring buffer / VecDeque.
///
/// # Fields
///
/// * `buffer` - The buffer of transitions.
/// * `capacity` - The capacity of the buffer.
#[derive(Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}
impl ReplayBuffer {
    /// Create a new replay buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the buffer is full.
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Iterate over the stored transitions, from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    /// Push a transition into the buffer.
    ///
    /// If the buffer is full, the oldest transition is removed to make room for
    /// the new transition.
    pub fn add(
        &mut self,
        transition: Transition,
    ) {
        if self.capacity == 0 {
            return;
        }
        if self.is_full() {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample a random batch of distinct transitions from the buffer.
    ///
    /// Indices are drawn without replacement within one call. When the buffer
    /// holds less than `batch_size` transitions, [`SacError::InsufficientData`]
    /// is returned.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> std::result::Result<Vec<&Transition>, SacError> {
        if self.buffer.len() < batch_size {
            return Err(SacError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        Ok(index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .filter_map(|i| self.buffer.get(i))
            .collect())
    }
}

/// A batch of transitions stacked into tensors.
///
/// * `states` - `(B, S)` f32
/// * `actions` - `(B, 1)` u32
/// * `rewards` - `(B, 1)` f32
/// * `next_states` - `(B, S)` f32
/// * `dones` - `(B, 1)` f32, 1.0 where the episode ended
pub struct Batch {
    pub states: Tensor,
    pub actions: Tensor,
    pub rewards: Tensor,
    pub next_states: Tensor,
    pub dones: Tensor,
}
impl Batch {
    pub fn from_transitions(
        transitions: &[&Transition],
        device: &Device,
    ) -> Result<Self> {
        let batch_size = transitions.len();
        let size_state = transitions.first().map_or(0, |t| t.state.len());

        let (states, actions, rewards, next_states, dones) = transitions
            .iter()
            .map(|t| {
                (
                    t.state.clone(),
                    t.action as u32,
                    t.reward,
                    t.next_state.clone(),
                    if t.done { 1f32 } else { 0f32 },
                )
            })
            .unzip_n_vec();

        Ok(Self {
            states: Tensor::from_vec(
                states.concat(),
                (batch_size, size_state),
                device,
            )?,
            actions: Tensor::from_vec(actions, (batch_size, 1), device)?,
            rewards: Tensor::from_vec(rewards, (batch_size, 1), device)?,
            next_states: Tensor::from_vec(
                next_states.concat(),
                (batch_size, size_state),
                device,
            )?,
            dones: Tensor::from_vec(dones, (batch_size, 1), device)?,
        })
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
        std::collections::HashSet,
    };

    fn transition(i: usize) -> Transition {
        Transition::new(
            &[i as f32, 0.0],
            i % 2,
            i as f32,
            &[i as f32 + 1.0, 0.0],
            false,
        )
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut buffer = ReplayBuffer::new(5);
        for i in 0..12 {
            buffer.add(transition(i));
            assert!(buffer.len() <= 5);
        }
        assert_eq!(buffer.len(), 5);
        assert!(buffer.is_full());

        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward()).collect();
        assert_eq!(rewards, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn samples_distinct_transitions() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..20 {
            buffer.add(transition(i));
        }
        for _ in 0..50 {
            let batch = buffer.sample(20, &mut rng).unwrap();
            assert_eq!(batch.len(), 20);
            let seen: HashSet<u32> = batch.iter().map(|t| t.reward() as u32).collect();
            assert_eq!(seen.len(), 20);
        }
    }

    #[test]
    fn small_buffer_scenario() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut buffer = ReplayBuffer::new(5);
        let inserted: Vec<Transition> = (0..3).map(transition).collect();
        for t in inserted.iter() {
            buffer.add(t.clone());
        }

        let batch = buffer.sample(2, &mut rng).unwrap();
        assert_eq!(batch.len(), 2);
        assert_ne!(batch[0], batch[1]);
        assert!(batch.iter().all(|t| inserted.contains(t)));

        match buffer.sample(4, &mut rng) {
            Err(SacError::InsufficientData { requested, available }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            _ => panic!("sampling more than stored must fail"),
        }
    }

    #[test]
    fn batch_has_expected_shapes() -> Result<()> {
        let mut buffer = ReplayBuffer::new(10);
        for i in 0..4 {
            buffer.add(transition(i));
        }
        buffer.add(Transition::new(&[9.0, 9.0], 1, -1.0, &[0.0, 0.0], true));

        let transitions: Vec<&Transition> = buffer.iter().collect();
        let batch = Batch::from_transitions(&transitions, &Device::Cpu)?;

        assert_eq!(batch.states.dims(), &[5, 2]);
        assert_eq!(batch.next_states.dims(), &[5, 2]);
        assert_eq!(batch.actions.dims(), &[5, 1]);
        assert_eq!(batch.rewards.dims(), &[5, 1]);
        assert_eq!(
            batch.dones.flatten_all()?.to_vec1::<f32>()?,
            vec![0.0, 0.0, 0.0, 0.0, 1.0],
        );
        assert_eq!(
            batch.actions.flatten_all()?.to_vec1::<u32>()?,
            vec![0, 1, 0, 1, 1],
        );
        Ok(())
    }
}
