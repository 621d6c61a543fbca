// SPDX-License-Identifier: AGPL-3.0-only

//! Layer sequencer: the top-level control FSM
//!
//! Owns every buffer and drives a bank of [`ComputeLane`]s across all layers
//! of one inference run.
//!
//! ```text
//!  Idle ─► LoadInput ─► LoadBias ─► LoadWeights ─► Compute ─► Activate ─► Store
//!   ▲                      ▲            ▲                                   │
//!   │                      │            └──────── more neurons in layer ────┤
//!   │                      └──────────── NextLayer ◄── layer complete ──────┘
//!   │                                        │ last layer
//!   └── enable low ── Done ◄── Output ◄──────┘
//! ```
//!
//! # Timing model
//!
//! Everything advances on [`LayerSequencer::tick`]. Within a tick the FSM
//! reads the lanes' registered outputs (done, result), commits its counter
//! and buffer updates, and computes the next lane commands; the lanes then
//! clock the commands registered on the previous tick. A command issued in
//! `Compute` therefore reaches the lanes one tick later, exactly like the
//! registered control outputs of the block.
//!
//! # Weight addressing
//!
//! In `Compute` every lane receives `weight[input_idx]` from the single
//! weight buffer, so all lanes of a group multiply by the same weight vector
//! and differ only in their bias. Index 0 loads biases instead of
//! accumulating, so `input[0]` never contributes. Both behaviours are part of
//! the block's observable contract and are reproduced as-is.

use crate::activation::ActivationTable;
use crate::error::{NnError, Result};
use crate::fixed::Fixed;
use crate::lane::{ComputeLane, LaneCommand};
use crate::stream::{Beat, BeatSink, BeatSource};
use crate::topology::Topology;
use nnacc_chip::regs::state;
use nnacc_chip::topology::{DEFAULT_NUM_PARALLEL, MAX_LAYER_WIDTH};
use tracing::{debug, info, warn};

/// Sequencer FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencerState {
    /// Waiting for enable + start.
    Idle,
    /// Streaming the input vector.
    LoadInput,
    /// Streaming the current layer's biases.
    LoadBias,
    /// Streaming one group's weight vector.
    LoadWeights,
    /// Issuing bias/MAC commands to the lanes.
    Compute,
    /// Waiting for every lane's done pulse.
    Activate,
    /// Writing lane results to the output buffer.
    Store,
    /// Output buffer copied to the input buffer.
    NextLayer,
    /// Streaming results out.
    Output,
    /// Run complete; holds until enable drops.
    Done,
}

impl SequencerState {
    /// Code reported in the STATUS register.
    pub const fn code(self) -> u32 {
        match self {
            Self::Idle => state::IDLE,
            Self::LoadInput => state::LOAD_INPUT,
            Self::LoadBias => state::LOAD_BIAS,
            Self::LoadWeights => state::LOAD_WEIGHTS,
            Self::Compute => state::COMPUTE,
            Self::Activate => state::ACTIVATE,
            Self::Store => state::STORE,
            Self::NextLayer => state::NEXT_LAYER,
            Self::Output => state::OUTPUT,
            Self::Done => state::DONE,
        }
    }

    /// Decode a STATUS state code.
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            state::IDLE => Self::Idle,
            state::LOAD_INPUT => Self::LoadInput,
            state::LOAD_BIAS => Self::LoadBias,
            state::LOAD_WEIGHTS => Self::LoadWeights,
            state::COMPUTE => Self::Compute,
            state::ACTIVATE => Self::Activate,
            state::STORE => Self::Store,
            state::NEXT_LAYER => Self::NextLayer,
            state::OUTPUT => Self::Output,
            state::DONE => Self::Done,
            _ => return None,
        })
    }

    /// Whether the input port is ready in this state.
    pub const fn accepts_input(self) -> bool {
        matches!(self, Self::LoadInput | Self::LoadBias | Self::LoadWeights)
    }
}

/// Control lines sampled every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInputs {
    /// Accelerator enabled.
    pub enable: bool,
    /// Start request.
    pub start: bool,
    /// Soft reset / clear.
    pub soft_reset: bool,
}

/// Build-time parameters of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorConfig {
    /// Compute lanes (`NUM_PARALLEL`).
    pub num_parallel: usize,
    /// Buffer width; upper bound for every layer size.
    pub max_width: usize,
    /// Apply the activation table on every layer; `false` passes the
    /// finalized sums through unchanged.
    pub activation: bool,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            num_parallel: DEFAULT_NUM_PARALLEL,
            max_width: MAX_LAYER_WIDTH,
            activation: true,
        }
    }
}

impl AcceleratorConfig {
    /// Set the lane count.
    #[must_use]
    pub fn with_num_parallel(mut self, num_parallel: usize) -> Self {
        self.num_parallel = num_parallel;
        self
    }

    /// Set the buffer width.
    #[must_use]
    pub fn with_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }

    /// Enable or bypass the activation table.
    #[must_use]
    pub fn with_activation(mut self, activation: bool) -> Self {
        self.activation = activation;
        self
    }

    /// # Errors
    ///
    /// Returns error if there are no lanes or the buffers have zero width.
    pub fn validate(&self) -> Result<()> {
        if self.num_parallel == 0 {
            return Err(NnError::invalid_config("num_parallel must be at least 1"));
        }
        if self.max_width == 0 {
            return Err(NnError::invalid_config("max_width must be at least 1"));
        }
        Ok(())
    }

    /// Check that every layer fits the buffers.
    ///
    /// # Errors
    ///
    /// Returns error naming the first layer wider than `max_width`.
    pub fn check_topology(&self, topology: &Topology) -> Result<()> {
        match topology.sizes().iter().position(|&s| s > self.max_width) {
            Some(layer) => Err(NnError::invalid_config(format!(
                "layer {layer} size {} exceeds buffer width {}",
                topology.size(layer),
                self.max_width
            ))),
            None => Ok(()),
        }
    }
}

/// Counters for the current (or last) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ticks from leaving `Idle` to entering `Done`.
    pub cycles: u64,
    /// Beats consumed from the input port.
    pub beats_in: usize,
    /// Beats delivered to the output port.
    pub beats_out: usize,
    /// `Store` steps executed (one per lane group per layer).
    pub stores: usize,
}

/// The control engine.
#[derive(Debug, Clone)]
pub struct LayerSequencer {
    config: AcceleratorConfig,
    table: ActivationTable,
    topology: Topology,
    state: SequencerState,

    layer: usize,
    input_idx: usize,
    weight_idx: usize,
    neuron_cnt: usize,
    out_idx: usize,

    input_buf: Vec<Fixed>,
    output_buf: Vec<Fixed>,
    bias_buf: Vec<Fixed>,
    weight_buf: Vec<Fixed>,

    lanes: Vec<ComputeLane>,
    /// Commands registered last tick; clocked into the lanes this tick.
    lane_cmds: Vec<LaneCommand>,
    next_cmds: Vec<LaneCommand>,

    stats: RunStats,
}

impl LayerSequencer {
    /// Build a sequencer with the MNIST topology.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the default topology
    /// does not fit its buffers.
    pub fn new(config: AcceleratorConfig, table: ActivationTable) -> Result<Self> {
        config.validate()?;
        let sizes: Vec<usize> = Topology::mnist()
            .sizes()
            .iter()
            .map(|&s| s.min(config.max_width))
            .collect();
        let topology = Topology::new(&sizes)?;
        let width = config.max_width;
        let lanes = config.num_parallel;
        Ok(Self {
            table,
            topology,
            state: SequencerState::Idle,
            layer: 1,
            input_idx: 0,
            weight_idx: 0,
            neuron_cnt: 0,
            out_idx: 0,
            input_buf: vec![Fixed::ZERO; width],
            output_buf: vec![Fixed::ZERO; width],
            bias_buf: vec![Fixed::ZERO; width],
            weight_buf: vec![Fixed::ZERO; width],
            lanes: vec![ComputeLane::new(); lanes],
            lane_cmds: vec![LaneCommand::IDLE; lanes],
            next_cmds: vec![LaneCommand::IDLE; lanes],
            stats: RunStats::default(),
            config,
        })
    }

    /// Replace the topology.
    ///
    /// # Errors
    ///
    /// Returns error if a run is in progress or a layer exceeds the buffers.
    pub fn set_topology(&mut self, topology: Topology) -> Result<()> {
        self.ensure_idle("topology")?;
        self.config.check_topology(&topology)?;
        debug!("sequencer topology {topology}");
        self.topology = topology;
        Ok(())
    }

    /// Replace the activation table contents.
    ///
    /// # Errors
    ///
    /// Returns error if a run is in progress.
    pub fn set_table(&mut self, table: ActivationTable) -> Result<()> {
        self.ensure_idle("activation table")?;
        self.table = table;
        Ok(())
    }

    fn ensure_idle(&self, what: &str) -> Result<()> {
        if self.state == SequencerState::Idle {
            Ok(())
        } else {
            Err(NnError::invalid_state(format!(
                "cannot change {what} while in {:?}",
                self.state
            )))
        }
    }

    /// Force `Idle`, clearing counters, lanes and in-flight commands.
    /// Buffer contents are left as they are.
    pub fn clear(&mut self) {
        if self.state != SequencerState::Idle {
            debug!("sequencer cleared in {:?}", self.state);
        }
        self.state = SequencerState::Idle;
        self.reset_counters();
        for lane in &mut self.lanes {
            lane.clear();
        }
        self.lane_cmds.fill(LaneCommand::IDLE);
        self.next_cmds.fill(LaneCommand::IDLE);
    }

    fn reset_counters(&mut self) {
        self.layer = 1;
        self.input_idx = 0;
        self.weight_idx = 0;
        self.neuron_cnt = 0;
        self.out_idx = 0;
    }

    /// Advance one clock.
    pub fn tick(
        &mut self,
        ctrl: ControlInputs,
        source: &mut dyn BeatSource,
        sink: &mut dyn BeatSink,
    ) {
        if ctrl.soft_reset {
            self.clear();
            return;
        }

        if self.is_busy() {
            self.stats.cycles += 1;
        }

        self.next_cmds.fill(LaneCommand::IDLE);
        self.step(ctrl, source, sink);

        for (lane, cmd) in self.lanes.iter_mut().zip(&self.lane_cmds) {
            lane.tick(cmd, &self.table);
        }
        std::mem::swap(&mut self.lane_cmds, &mut self.next_cmds);
    }

    fn goto(&mut self, next: SequencerState) {
        debug!(
            from = ?self.state,
            to = ?next,
            layer = self.layer,
            neuron = self.neuron_cnt,
            "sequencer transition"
        );
        self.state = next;
    }

    fn current_size(&self) -> usize {
        self.topology.size(self.layer)
    }

    fn previous_size(&self) -> usize {
        self.topology.size(self.layer - 1)
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, ctrl: ControlInputs, source: &mut dyn BeatSource, sink: &mut dyn BeatSink) {
        match self.state {
            SequencerState::Idle => {
                if ctrl.enable && ctrl.start {
                    self.reset_counters();
                    for lane in &mut self.lanes {
                        lane.clear();
                    }
                    self.stats = RunStats::default();
                    info!(
                        "inference start: topology {}, {} lanes",
                        self.topology, self.config.num_parallel
                    );
                    self.goto(SequencerState::LoadInput);
                }
            }

            SequencerState::LoadInput => {
                if let Some(beat) = source.next_beat() {
                    self.stats.beats_in += 1;
                    let size = self.topology.input_size();
                    self.input_buf[self.input_idx] = beat.data;
                    if beat.last || self.input_idx + 1 >= size {
                        if self.input_idx + 1 < size {
                            warn!(
                                "input stream ended after {} of {size} elements",
                                self.input_idx + 1
                            );
                        }
                        self.input_idx = 0;
                        self.neuron_cnt = 0;
                        self.goto(SequencerState::LoadBias);
                    } else {
                        self.input_idx += 1;
                    }
                }
            }

            SequencerState::LoadBias => {
                if let Some(beat) = source.next_beat() {
                    self.stats.beats_in += 1;
                    self.bias_buf[self.neuron_cnt] = beat.data;
                    self.neuron_cnt += 1;
                    if self.neuron_cnt >= self.current_size() {
                        self.neuron_cnt = 0;
                        self.weight_idx = 0;
                        self.goto(SequencerState::LoadWeights);
                    }
                }
            }

            SequencerState::LoadWeights => {
                if let Some(beat) = source.next_beat() {
                    self.stats.beats_in += 1;
                    self.weight_buf[self.weight_idx] = beat.data;
                    if self.weight_idx + 1 >= self.previous_size() {
                        self.weight_idx = 0;
                        self.input_idx = 0;
                        self.goto(SequencerState::Compute);
                    } else {
                        self.weight_idx += 1;
                    }
                }
            }

            SequencerState::Compute => {
                let first = self.input_idx == 0;
                let input = self.input_buf[self.input_idx];
                let weight = self.weight_buf[self.input_idx];
                for (i, cmd) in self.next_cmds.iter_mut().enumerate() {
                    *cmd = LaneCommand {
                        load_bias: first,
                        accumulate: !first,
                        input,
                        weight,
                        bias: self
                            .bias_buf
                            .get(self.neuron_cnt + i)
                            .copied()
                            .unwrap_or(Fixed::ZERO),
                        activate: self.config.activation,
                    };
                }
                if self.input_idx + 1 >= self.previous_size() {
                    self.input_idx = 0;
                    self.goto(SequencerState::Activate);
                } else {
                    self.input_idx += 1;
                }
            }

            SequencerState::Activate => {
                if self.lanes.iter().all(ComputeLane::is_done) {
                    self.goto(SequencerState::Store);
                }
            }

            SequencerState::Store => {
                let size = self.current_size();
                for (i, lane) in self.lanes.iter().enumerate() {
                    let idx = self.neuron_cnt + i;
                    if idx < size {
                        self.output_buf[idx] = lane.result();
                    }
                }
                self.stats.stores += 1;
                self.neuron_cnt += self.config.num_parallel;
                if self.neuron_cnt >= size {
                    self.goto(SequencerState::NextLayer);
                } else {
                    self.weight_idx = 0;
                    self.goto(SequencerState::LoadWeights);
                }
            }

            SequencerState::NextLayer => {
                self.input_buf.copy_from_slice(&self.output_buf);
                if self.layer >= self.topology.last_layer() {
                    self.out_idx = 0;
                    self.goto(SequencerState::Output);
                } else {
                    self.layer += 1;
                    self.neuron_cnt = 0;
                    self.goto(SequencerState::LoadBias);
                }
            }

            SequencerState::Output => {
                if sink.is_ready() {
                    let last = self.out_idx + 1 >= self.topology.output_size();
                    sink.accept(Beat {
                        data: self.output_buf[self.out_idx],
                        last,
                    });
                    self.stats.beats_out += 1;
                    if last {
                        info!(
                            "inference done: {} cycles, {} beats in",
                            self.stats.cycles, self.stats.beats_in
                        );
                        self.goto(SequencerState::Done);
                    } else {
                        self.out_idx += 1;
                    }
                }
            }

            SequencerState::Done => {
                if !ctrl.enable {
                    self.goto(SequencerState::Idle);
                }
            }
        }
    }

    /// Current FSM state.
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// A run is in progress (between leaving `Idle` and reaching `Done`).
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, SequencerState::Idle | SequencerState::Done)
    }

    /// Completion signal; high while in `Done`.
    pub fn is_done(&self) -> bool {
        self.state == SequencerState::Done
    }

    /// Input port ready.
    pub const fn input_ready(&self) -> bool {
        self.state.accepts_input()
    }

    /// Active topology.
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Build-time parameters.
    pub const fn config(&self) -> &AcceleratorConfig {
        &self.config
    }

    /// Activation table in use.
    pub const fn table(&self) -> &ActivationTable {
        &self.table
    }

    /// Layer being computed (1 = first hidden layer).
    pub const fn layer(&self) -> usize {
        self.layer
    }

    /// Base neuron of the current lane group.
    pub const fn neuron_count(&self) -> usize {
        self.neuron_cnt
    }

    /// Counters of the current or last run.
    pub const fn stats(&self) -> RunStats {
        self.stats
    }

    /// Input buffer (layer input / previous activations).
    pub fn input_buffer(&self) -> &[Fixed] {
        &self.input_buf
    }

    /// Output buffer of the layer being computed.
    pub fn output_buffer(&self) -> &[Fixed] {
        &self.output_buf
    }

    /// Bias buffer of the current layer.
    pub fn bias_buffer(&self) -> &[Fixed] {
        &self.bias_buf
    }

    /// Weight vector of the current group.
    pub fn weight_buffer(&self) -> &[Fixed] {
        &self.weight_buf
    }

    /// The lane bank.
    pub fn lanes(&self) -> &[ComputeLane] {
        &self.lanes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{packetize, BeatCollector, BeatQueue};

    const RUN: ControlInputs = ControlInputs { enable: true, start: true, soft_reset: false };
    const HOLD: ControlInputs = ControlInputs { enable: true, start: false, soft_reset: false };
    const RESET: ControlInputs = ControlInputs { enable: false, start: false, soft_reset: true };

    fn fx(v: &[f32]) -> Vec<Fixed> {
        v.iter().map(|&x| Fixed::from_f32(x)).collect()
    }

    fn sequencer(sizes: &[usize], lanes: usize, activation: bool) -> LayerSequencer {
        let config = AcceleratorConfig::default()
            .with_num_parallel(lanes)
            .with_max_width(8)
            .with_activation(activation);
        let mut s = LayerSequencer::new(config, ActivationTable::sigmoid()).unwrap();
        s.set_topology(Topology::new(sizes).unwrap()).unwrap();
        s
    }

    /// Tick until `Done` (or the budget runs out); returns collected output.
    fn run(s: &mut LayerSequencer, q: &mut BeatQueue) -> Vec<Fixed> {
        let mut out = BeatCollector::new();
        s.tick(RUN, q, &mut out);
        for _ in 0..10_000 {
            if s.is_done() {
                break;
            }
            s.tick(HOLD, q, &mut out);
        }
        assert!(s.is_done(), "run did not complete, stuck in {:?}", s.state());
        out.drain()
    }

    #[test]
    fn state_codes_roundtrip() {
        for code in 0..10 {
            let s = SequencerState::from_code(code).unwrap();
            assert_eq!(s.code(), code);
        }
        assert!(SequencerState::from_code(10).is_none());
    }

    #[test]
    fn single_layer_linear_skips_input_zero() {
        // 3 → 1, linear: out = bias + in[1]·w[1] + in[2]·w[2]; in[0] never contributes
        let mut s = sequencer(&[3, 1], 1, false);
        let mut q = BeatQueue::new();
        q.extend(packetize(&fx(&[4.0, 1.0, 2.0])));
        q.extend(packetize(&fx(&[0.5])));
        q.extend(packetize(&fx(&[1.0, 0.25, 0.5])));
        let out = run(&mut s, &mut q);
        assert_eq!(out, fx(&[0.5 + 0.25 + 1.0]));
        assert!(q.is_empty());
    }

    #[test]
    fn lanes_share_the_weight_vector() {
        // 2 → 2 with two lanes: both neurons see the same weights, only biases differ
        let mut s = sequencer(&[2, 2], 2, false);
        let mut q = BeatQueue::new();
        q.extend(packetize(&fx(&[1.0, 2.0])));
        q.extend(packetize(&fx(&[0.0, 1.0])));
        q.extend(packetize(&fx(&[3.0, 0.5])));
        let out = run(&mut s, &mut q);
        assert_eq!(out, fx(&[1.0, 2.0]));
    }

    #[test]
    fn three_neurons_two_lanes_take_two_groups() {
        let mut s = sequencer(&[2, 3], 2, true);
        let mut q = BeatQueue::new();
        q.extend(packetize(&fx(&[0.0, 1.0])));
        q.extend(packetize(&fx(&[0.0, 0.0, 0.0])));
        q.extend(packetize(&fx(&[0.0, 1.0])));
        q.extend(packetize(&fx(&[0.0, -1.0])));
        let out = run(&mut s, &mut q);
        let t = ActivationTable::sigmoid();
        assert_eq!(out, vec![t.lookup(Fixed::ONE), t.lookup(Fixed::ONE), t.lookup(Fixed::from_f32(-1.0))]);
        assert_eq!(s.stats().stores, 2);
        assert_eq!(s.stats().beats_in, 2 + 3 + 2 * 2);
        // lane 1 of the second group is out of range and must not be stored
        assert_eq!(s.output_buffer()[3], Fixed::ZERO);
    }

    #[test]
    fn next_layer_copies_output_buffer() {
        let mut s = sequencer(&[2, 2, 1], 2, true);
        let mut q = BeatQueue::new();
        q.extend(packetize(&fx(&[1.0, 0.5])));
        q.extend(packetize(&fx(&[0.25, -0.25])));
        q.extend(packetize(&fx(&[1.0, 1.0])));
        q.extend(packetize(&fx(&[0.0])));
        q.extend(packetize(&fx(&[1.0, 1.0])));
        let mut out = BeatCollector::new();
        s.tick(RUN, &mut q, &mut out);
        let mut checked = false;
        for _ in 0..1000 {
            if s.state() == SequencerState::NextLayer && !checked {
                let before = s.output_buffer().to_vec();
                s.tick(HOLD, &mut q, &mut out);
                assert_eq!(s.input_buffer(), &before[..]);
                checked = true;
                continue;
            }
            if s.is_done() {
                break;
            }
            s.tick(HOLD, &mut q, &mut out);
        }
        assert!(checked && s.is_done());
    }

    #[test]
    fn early_last_truncates_input() {
        let mut s = sequencer(&[3, 1], 1, false);
        let mut q = BeatQueue::new();
        // only two input beats, the second marked last
        q.extend(packetize(&fx(&[0.0, 2.0])));
        q.extend(packetize(&fx(&[0.0])));
        q.extend(packetize(&fx(&[0.0, 1.0, 1.0])));
        let out = run(&mut s, &mut q);
        // in[2] is whatever the buffer held before: zero on a fresh sequencer
        assert_eq!(out, fx(&[2.0]));
    }

    #[test]
    fn waits_for_valid_and_ready() {
        let mut fast = sequencer(&[2, 2], 2, true);
        let mut slow = sequencer(&[2, 2], 2, true);
        let stream = [fx(&[1.0, 2.0]), fx(&[0.5, 1.5]), fx(&[1.0, -1.0])].concat();
        let mut q1 = BeatQueue::new();
        q1.extend(packetize(&stream));
        let mut q2 = BeatQueue::new().with_stall_every(2);
        q2.extend(packetize(&stream));
        let a = run(&mut fast, &mut q1);
        let b = run(&mut slow, &mut q2);
        assert_eq!(a, b);
        assert!(slow.stats().cycles > fast.stats().cycles);
    }

    #[test]
    fn soft_reset_from_any_state_returns_to_idle() {
        let stream = [fx(&[1.0, 2.0]), fx(&[0.5, 1.5, 0.0]), fx(&[1.0, -1.0]), fx(&[1.0, 1.0])].concat();
        let mut reference = sequencer(&[2, 3], 2, true);
        let mut q = BeatQueue::new();
        q.extend(packetize(&stream));
        let expected = run(&mut reference, &mut q);

        for stop_after in 0..40 {
            let mut s = sequencer(&[2, 3], 2, true);
            let mut q = BeatQueue::new();
            q.extend(packetize(&stream));
            let mut out = BeatCollector::new();
            s.tick(RUN, &mut q, &mut out);
            for _ in 0..stop_after {
                s.tick(HOLD, &mut q, &mut out);
            }
            s.tick(RESET, &mut q, &mut out);
            assert_eq!(s.state(), SequencerState::Idle);
            assert!(!s.is_busy() && !s.is_done());
            assert!(s.lanes().iter().all(|l| !l.is_busy()));

            // identical rerun after the clear
            let mut q = BeatQueue::new();
            q.extend(packetize(&stream));
            assert_eq!(run(&mut s, &mut q), expected, "rerun after clear at tick {stop_after}");
        }
    }

    #[test]
    fn done_holds_until_enable_drops() {
        let mut s = sequencer(&[1, 1], 1, false);
        let mut q = BeatQueue::new();
        q.extend(packetize(&fx(&[1.0, 0.5, 1.0])));
        run(&mut s, &mut q);
        let mut out = BeatCollector::new();
        for _ in 0..5 {
            s.tick(HOLD, &mut q, &mut out);
            assert!(s.is_done());
        }
        s.tick(ControlInputs::default(), &mut q, &mut out);
        assert_eq!(s.state(), SequencerState::Idle);
    }

    #[test]
    fn topology_is_frozen_during_a_run() {
        let mut s = sequencer(&[2, 2], 2, true);
        let mut q = BeatQueue::new();
        let mut out = BeatCollector::new();
        s.tick(RUN, &mut q, &mut out);
        assert!(s.set_topology(Topology::new(&[3, 3]).unwrap()).is_err());
        assert!(s.set_table(ActivationTable::sigmoid()).is_err());
        s.tick(RESET, &mut q, &mut out);
        assert!(s.set_topology(Topology::new(&[3, 3]).unwrap()).is_ok());
        assert!(s.set_topology(Topology::new(&[9, 3]).unwrap()).is_err());
    }
}
