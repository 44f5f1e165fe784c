use stochastic_shared::types::SWING;

/// Maps a nominal tick to its swing-adjusted tick.
pub trait Groove {
    fn apply_swing(&self, tick: u32, swing: i32) -> u32;
}

/// 16th-note swing: within each pair of 16ths the second one is moved so the
/// pair splits at `swing` percent instead of 50.
#[derive(Debug, Clone, Copy)]
pub struct SwingGroove {
    /// Ticks per 16th note.
    base: u32,
}

impl SwingGroove {
    pub fn new(ppqn: u32) -> Self {
        Self {
            base: (ppqn / 4).max(1),
        }
    }
}

impl Groove for SwingGroove {
    fn apply_swing(&self, tick: u32, swing: i32) -> u32 {
        let swing = SWING.clamp(swing);
        if swing == SWING.min {
            return tick;
        }
        let base = self.base as u64;
        let pair = base * 2;
        let tick = tick as u64;
        let pos = tick % pair;
        let start = tick - pos;
        let split = pair * swing as u64 / 100;

        let shifted = if pos < base {
            pos * split / base
        } else {
            split + (pos - base) * (pair - split) / base
        };
        (start + shifted).min(u32::MAX as u64) as u32
    }
}
