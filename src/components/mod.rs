//! # Components
//!
//! This module contains the components that are used to build an agent.
//!
//! ## Replay Buffer
//!
//! The [`ReplayBuffer`] struct implements a fixed capacity ring buffer of
//! [`Transition`]s, which is used in off-policy algorithms such as
//! [`crate::agents::SAC`]. Sampled transitions are stacked into a [`Batch`].
//!
//! ## Networks
//!
//! The [`CategoricalPolicy`] maps states to a distribution over discrete
//! actions, the [`Critic`] maps states to one Q-value per action. Both are
//! feed-forward stacks built by [`mlp::build_mlp`].
//!
//! ## Training utilities
//!
//! [`soft_update`] implements Polyak averaging of target networks,
//! [`Optim`] wraps the optimizers together with gradient clipping and
//! [`Temperature`] holds the (optionally learned) entropy temperature.

pub mod mlp;
mod critic;
mod optim;
mod policy;
mod replay_buffer;
mod soft_update;
mod temperature;

pub use critic::Critic;
pub use mlp::Activation;
pub use optim::{
    clip_grad_norm,
    Optim,
    OptimizerKind,
};
pub use policy::{
    CategoricalPolicy,
    PolicySample,
    StateBatch,
    LOG_PROB_EPSILON,
};
pub use replay_buffer::{
    Batch,
    ReplayBuffer,
    Transition,
};
pub use soft_update::soft_update;
pub use temperature::{
    target_entropy,
    Temperature,
};
