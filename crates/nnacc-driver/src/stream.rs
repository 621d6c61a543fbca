// SPDX-License-Identifier: AGPL-3.0-only

//! Streaming data ports
//!
//! The core is a passive consumer on its input port and a producer on its
//! output port. A transfer happens on a tick when the producer has a beat and
//! the consumer is ready; the traits below model exactly that handshake.
//!
//! ```text
//!   host ──► BeatSource ──► [LoadInput | LoadBias | LoadWeights]
//!   [Output] ──► BeatSink ──► host
//! ```

use crate::fixed::Fixed;
use std::collections::VecDeque;

/// One transfer on a stream port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    /// Payload.
    pub data: Fixed,
    /// End-of-packet marker.
    pub last: bool,
}

impl Beat {
    /// A beat in the middle of a packet.
    pub const fn data(data: Fixed) -> Self {
        Self { data, last: false }
    }

    /// The final beat of a packet.
    pub const fn last(data: Fixed) -> Self {
        Self { data, last: true }
    }
}

/// Producer side of the input port.
///
/// Called only on ticks where the core asserts ready; returning `Some`
/// completes the handshake for that tick.
pub trait BeatSource {
    /// Hand over the next beat if one is valid this tick.
    fn next_beat(&mut self) -> Option<Beat>;
}

/// Consumer side of the output port.
pub trait BeatSink {
    /// Whether the consumer accepts a beat this tick.
    fn is_ready(&mut self) -> bool;

    /// Deliver a beat. Only called after `is_ready` returned true on the same tick.
    fn accept(&mut self, beat: Beat);
}

/// FIFO-backed input port with an optional valid pattern.
///
/// With a stall period of `n`, the source withholds its beat on every
/// `n`-th tick it is asked, which exercises the wait-for-valid paths.
#[derive(Debug, Default, Clone)]
pub struct BeatQueue {
    beats: VecDeque<Beat>,
    stall_every: Option<u32>,
    polls: u32,
}

impl BeatQueue {
    /// Empty queue that is valid whenever it holds data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Withhold a beat on every `period`-th poll (`period` ≥ 2).
    #[must_use]
    pub fn with_stall_every(mut self, period: u32) -> Self {
        self.stall_every = (period >= 2).then_some(period);
        self
    }

    /// Queue beats behind anything already pending.
    pub fn extend(&mut self, beats: impl IntoIterator<Item = Beat>) {
        self.beats.extend(beats);
    }

    /// Beats not yet consumed.
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// Whether every queued beat has been consumed.
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Drop everything still queued.
    pub fn clear(&mut self) {
        self.beats.clear();
    }
}

impl BeatSource for BeatQueue {
    fn next_beat(&mut self) -> Option<Beat> {
        self.polls = self.polls.wrapping_add(1);
        if let Some(period) = self.stall_every {
            if self.polls % period == 0 {
                return None;
            }
        }
        self.beats.pop_front()
    }
}

/// Output port that records every accepted beat.
#[derive(Debug, Default, Clone)]
pub struct BeatCollector {
    beats: Vec<Beat>,
    ready_every: Option<u32>,
    polls: u32,
}

impl BeatCollector {
    /// Collector that is always ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only ready on every `period`-th tick (`period` ≥ 2), to apply backpressure.
    #[must_use]
    pub fn with_ready_every(mut self, period: u32) -> Self {
        self.ready_every = (period >= 2).then_some(period);
        self
    }

    /// Beats received so far.
    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    /// Take the received payloads, leaving the collector empty.
    pub fn drain(&mut self) -> Vec<Fixed> {
        self.beats.drain(..).map(|b| b.data).collect()
    }
}

impl BeatSink for BeatCollector {
    fn is_ready(&mut self) -> bool {
        self.polls = self.polls.wrapping_add(1);
        self.ready_every.map_or(true, |period| self.polls % period == 0)
    }

    fn accept(&mut self, beat: Beat) {
        self.beats.push(beat);
    }
}

/// Mark the final beat of a payload sequence as `last`.
pub fn packetize(values: &[Fixed]) -> Vec<Beat> {
    let n = values.len();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| Beat { data: v, last: i + 1 == n })
        .collect()
}
