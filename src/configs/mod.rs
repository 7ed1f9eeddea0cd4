mod sac;
mod train;

pub use sac::SAC_Config;
pub use train::TrainConfig;


pub trait OffPolicyConfig {
    fn seed(&self) -> u64;
    fn set_seed(&mut self, seed: u64);
    fn replay_buffer_capacity(&self) -> usize;
    fn training_batch_size(&self) -> usize;
    fn update_every(&self) -> usize;
    fn num_updates(&self) -> usize;
}
