pub mod logging;
pub mod error;
pub mod util;

pub mod envs;
pub mod components;
pub mod configs;
pub mod agents;

pub mod cli;
pub mod engine;
