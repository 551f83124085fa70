//! Race Orchestration Core — concurrent fan-out benchmarking of multiple LLM
//! endpoints against Crossword and Wordle puzzles, streamed as a typed event
//! sequence over SSE.

pub mod adapter;
pub mod config;
pub mod crossword;
pub mod error;
pub mod model_spec;
pub mod normalize;
pub mod race;
pub mod registry;
pub mod runner;
pub mod scoring;
pub mod transport;
pub mod wordle;

pub use config::AppConfig;
pub use error::{RaceError, Result};
pub use model_spec::ModelSpec;
pub use race::events::RaceEvent;
pub use registry::ModelRegistry;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
