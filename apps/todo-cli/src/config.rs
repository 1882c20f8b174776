//! Configuration for the todo CLI

use core_config::{ClientConfig, Environment, FromEnv, env_or_default};
use eyre::Result;
use std::path::PathBuf;

pub const DEFAULT_SESSION_FILE: &str = ".todo-session.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub client: ClientConfig,
    /// Where the token pair and cached profile are kept between runs
    pub session_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            environment: Environment::from_env(),
            client: ClientConfig::from_env()?,
            session_file: PathBuf::from(env_or_default("TODO_SESSION_FILE", DEFAULT_SESSION_FILE)),
        })
    }
}
