use crate::config::EngineConfig;

/// Transport state passed to the track engine on every call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportState {
    pub running: bool,
    pub recording: bool,
    /// Ticks per measure, used by the sequence reset period.
    pub measure_divisor: u32,
}

impl Default for TransportState {
    fn default() -> Self {
        Self::for_config(&EngineConfig::default())
    }
}

impl TransportState {
    /// Stopped transport with a 4/4 measure at the configured resolution.
    pub fn for_config(config: &EngineConfig) -> Self {
        Self {
            running: false,
            recording: false,
            measure_divisor: config.ppqn.saturating_mul(4),
        }
    }

    pub fn running() -> Self {
        Self {
            running: true,
            ..Self::default()
        }
    }

    /// Tick relative to the start of the current reset period.
    pub fn relative_tick(&self, tick: u32, reset_measure: i32) -> u32 {
        let reset_divisor = (reset_measure.max(0) as u32).saturating_mul(self.measure_divisor);
        if reset_divisor == 0 {
            tick
        } else {
            tick % reset_divisor
        }
    }
}
