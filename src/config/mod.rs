// Configuration module
//
// This module contains all configuration-related functionality split into focused submodules:
// - types: Core configuration structure, defaults and command line overrides
// - loader: Configuration file loading and saving
// - validator: Configuration validation logic

pub mod loader;
pub mod types;
pub mod validator;

pub use types::{Config, ConfigOverrides};
