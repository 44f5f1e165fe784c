use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event queue full ({capacity} entries), dropped entry at tick {tick}")]
    QueueFull { tick: u32, capacity: usize },
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    #[error("failed to parse engine config: {0}")]
    Json(#[from] serde_json::Error),
}
