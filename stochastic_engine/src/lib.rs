pub mod config;
pub mod engine; // StochasticEngine lives here
pub mod error;
pub mod evaluator;
pub mod groove;
pub mod output;
pub mod queue;
pub mod random;
pub mod record;
pub mod sequence_state;
pub mod slide;
pub mod transport;
pub mod weighted;

// Re-exports
pub use config::EngineConfig;
pub use engine::{EngineContext, LinkData, StochasticEngine, TickResult, TriggerOutcome};
pub use error::EngineError;
pub use groove::{Groove, SwingGroove};
pub use output::{ChannelOutput, MidiOutput, NullOutput, OutputEvent};
pub use transport::TransportState;
