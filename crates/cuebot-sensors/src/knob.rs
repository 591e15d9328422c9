//! `Knob` – a per-callback view of one potentiometer channel.

use cuebot_types::{ChannelReading, ADC_FULL_SCALE};

use crate::poller::PollSnapshot;

/// One knob reading, borrowed from the poll cycle that produced it.
///
/// Constructed fresh for every knob-handler invocation; the borrow keeps it
/// from outliving the cycle.
#[derive(Debug, Clone, Copy)]
pub struct Knob<'a> {
    pub pin: usize,
    pub value: i32,
    snapshot: &'a PollSnapshot,
}

impl<'a> Knob<'a> {
    pub fn new(reading: &ChannelReading, snapshot: &'a PollSnapshot) -> Self {
        Self {
            pin: reading.channel,
            value: reading.raw_value,
            snapshot,
        }
    }

    /// Value this channel held in the previous cycle.
    pub fn previous_value(&self) -> i32 {
        self.snapshot.previous.get(self.pin).copied().unwrap_or(0)
    }

    /// Raw value of another channel in the same cycle.
    pub fn sibling(&self, channel: usize) -> Option<i32> {
        self.snapshot.reading(channel).map(|r| r.raw_value)
    }

    /// `value / 1024`, clamped to `0.0..=1.0`.
    pub fn normalized(&self) -> f32 {
        (self.value as f32 / ADC_FULL_SCALE as f32).clamp(0.0, 1.0)
    }

    /// `1 − value / 1024`, for knobs mounted so that clockwise reads low.
    pub fn inverted(&self) -> f32 {
        1.0 - self.normalized()
    }

    pub fn snapshot(&self) -> &'a PollSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PollSnapshot {
        PollSnapshot {
            cycle: 7,
            readings: vec![
                ChannelReading {
                    channel: 0,
                    raw_value: 10,
                    changed_since_last: false,
                },
                ChannelReading {
                    channel: 1,
                    raw_value: 512,
                    changed_since_last: true,
                },
            ],
            previous: vec![10, 100],
        }
    }

    #[test]
    fn knob_exposes_history_and_siblings() {
        let snap = snapshot();
        let knob = Knob::new(&snap.readings[1], &snap);
        assert_eq!(knob.pin, 1);
        assert_eq!(knob.value, 512);
        assert_eq!(knob.previous_value(), 100);
        assert_eq!(knob.sibling(0), Some(10));
        assert_eq!(knob.sibling(5), None);
        assert_eq!(knob.snapshot().cycle, 7);
    }

    #[test]
    fn knob_scaling() {
        let snap = snapshot();
        let knob = Knob::new(&snap.readings[1], &snap);
        assert!((knob.normalized() - 0.5).abs() < 1e-6);
        assert!((knob.inverted() - 0.5).abs() < 1e-6);
    }
}
