use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;
use tracing::warn;

/// Receives the gate, CV and slide changes of a track.
pub trait MidiOutput {
    fn send_gate(&mut self, track: usize, gate: bool);
    fn send_cv(&mut self, track: usize, volts: f32);
    fn send_slide(&mut self, track: usize, slide: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum OutputEvent {
    Gate { track: usize, gate: bool },
    Cv { track: usize, volts: f32 },
    Slide { track: usize, slide: bool },
}

/// Forwards output events to another thread without blocking.
pub struct ChannelOutput {
    tx: Sender<OutputEvent>,
}

impl ChannelOutput {
    pub fn new(tx: Sender<OutputEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: OutputEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "output channel full, event dropped")
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl MidiOutput for ChannelOutput {
    fn send_gate(&mut self, track: usize, gate: bool) {
        self.forward(OutputEvent::Gate { track, gate });
    }

    fn send_cv(&mut self, track: usize, volts: f32) {
        self.forward(OutputEvent::Cv { track, volts });
    }

    fn send_slide(&mut self, track: usize, slide: bool) {
        self.forward(OutputEvent::Slide { track, slide });
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl MidiOutput for NullOutput {
    fn send_gate(&mut self, _track: usize, _gate: bool) {}
    fn send_cv(&mut self, _track: usize, _volts: f32) {}
    fn send_slide(&mut self, _track: usize, _slide: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    #[test]
    fn test_channel_output_forwards_in_order() {
        let (tx, rx) = unbounded();
        let mut output = ChannelOutput::new(tx);
        output.send_gate(2, true);
        output.send_cv(2, 0.5);
        output.send_slide(2, false);
        let events: Vec<OutputEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                OutputEvent::Gate {
                    track: 2,
                    gate: true,
                },
                OutputEvent::Cv {
                    track: 2,
                    volts: 0.5,
                },
                OutputEvent::Slide {
                    track: 2,
                    slide: false,
                },
            ]
        );
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = bounded(1);
        let mut output = ChannelOutput::new(tx);
        output.send_gate(0, true);
        output.send_gate(0, false);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
