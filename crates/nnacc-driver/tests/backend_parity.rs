// SPDX-License-Identifier: AGPL-3.0-only

//! The functional backend must agree bit for bit with the cycle-accurate one.

use nnacc_driver::{
    packetize, AcceleratorConfig, Accelerator, Beat, BeatCollector, BeatQueue, CycleBackend,
    Fixed, InferenceBackend, NnDriver, SoftwareBackend, Topology,
};

/// Small deterministic generator; values in [-2, 2).
struct Lcg(u64);

impl Lcg {
    fn next_fixed(&mut self) -> Fixed {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        let raw = ((self.0 >> 33) as i32 % 8192) - 4096;
        Fixed::from_raw(raw as i16)
    }

    fn stream(&mut self, topology: &Topology, lanes: usize) -> Vec<Beat> {
        let values: Vec<Fixed> = (0..topology.stream_len(lanes)).map(|_| self.next_fixed()).collect();
        packetize(&values)
    }
}

fn pair(config: &AcceleratorConfig) -> (CycleBackend, SoftwareBackend) {
    (
        CycleBackend::new(config.clone()).expect("cycle backend"),
        SoftwareBackend::new(config.clone()).expect("software backend"),
    )
}

#[test]
fn parity_across_topologies_and_lane_counts() {
    let topologies = [
        vec![4, 3],
        vec![5, 4, 3],
        vec![6, 5, 4, 3],
        vec![3, 7, 2],
        vec![1, 1],
    ];
    let mut rng = Lcg(0x5eed);
    for sizes in &topologies {
        let topology = Topology::new(sizes).unwrap();
        for lanes in 1..=4 {
            let config = AcceleratorConfig::default().with_num_parallel(lanes);
            let (mut cycle, mut soft) = pair(&config);
            for run in 0..3 {
                let stream = rng.stream(&topology, lanes);
                let a = cycle.infer(&topology, &stream).unwrap();
                let b = soft.infer(&topology, &stream).unwrap();
                assert_eq!(a, b, "{topology}, {lanes} lanes, run {run}");
                assert_eq!(a.len(), topology.output_size());
            }
        }
    }
}

#[test]
fn parity_in_linear_mode() {
    let topology = Topology::new(&[8, 6, 4]).unwrap();
    let config = AcceleratorConfig::default().with_num_parallel(4).with_activation(false);
    let (mut cycle, mut soft) = pair(&config);
    let mut rng = Lcg(7);
    for _ in 0..4 {
        let stream = rng.stream(&topology, 4);
        assert_eq!(cycle.infer(&topology, &stream).unwrap(), soft.infer(&topology, &stream).unwrap());
    }
}

#[test]
fn parity_with_early_last_and_stale_input() {
    let topology = Topology::new(&[4, 2]).unwrap();
    let config = AcceleratorConfig::default().with_num_parallel(2);
    let (mut cycle, mut soft) = pair(&config);
    let mut rng = Lcg(99);

    // a full run leaves input slots 2 and 3 populated
    let full = rng.stream(&topology, 2);
    assert_eq!(cycle.infer(&topology, &full).unwrap(), soft.infer(&topology, &full).unwrap());

    // now only two input beats, the second marked last
    let mut short = vec![Beat::data(rng.next_fixed()), Beat::last(rng.next_fixed())];
    short.extend((0..2 + 4).map(|_| Beat::data(rng.next_fixed())));
    let a = cycle.infer(&topology, &short).unwrap();
    let b = soft.infer(&topology, &short).unwrap();
    assert_eq!(a, b);
}

#[test]
fn stalls_change_timing_not_results() {
    let topology = Topology::new(&[6, 5, 3]).unwrap();
    let config = AcceleratorConfig::default().with_num_parallel(2);
    let stream = Lcg(3).stream(&topology, 2);

    let mut smooth = CycleBackend::new(config.clone()).unwrap();
    let expected = smooth.infer(&topology, &stream).unwrap();

    let dev = Accelerator::new(config)
        .unwrap()
        .with_input(BeatQueue::new().with_stall_every(3))
        .with_output(BeatCollector::new().with_ready_every(4));
    let mut stalled = CycleBackend::from_driver(NnDriver::new(dev));
    let got = stalled.infer(&topology, &stream).unwrap();

    assert_eq!(got, expected);
    assert!(stalled.last_cycles().unwrap() > smooth.last_cycles().unwrap());
}
