// Library surface for the headless engine; the binary is a thin driver over it.
pub mod advisor;
pub mod app_dirs;
pub mod autoplay;
pub mod beat;
pub mod character;
pub mod config;
pub mod effects;
pub mod error;
pub mod progress;
pub mod race;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod store;
pub mod tension;
pub mod trace;
pub mod util;

pub use error::{Error, Result};
