// SPDX-License-Identifier: AGPL-3.0-only

//! Cycle-count benchmark for the accelerator model.
//!
//! Two sweeps over a stall-free device:
//!   width : in=W → W/2 → 10 with 4 lanes, W = 32 .. 784
//!   lanes : the default 784→16→16→10 network with 1, 2, 4, 8, 16 lanes
//!
//! Every run is checked against the functional backend and against the
//! closed-form cycle estimate; the wall-clock column is simulator speed,
//! not accelerator speed.
//!
//! Usage:
//!   cargo run --release --bin bench_cycles
//!   cargo run --release --bin bench_cycles -- --iterations 20

use anyhow::{ensure, Result};
use nnacc_driver::{
    estimate_cycles, AcceleratorConfig, CycleBackend, Fixed, InferenceBackend, SoftwareBackend,
    Topology,
};
use nnacc_models::{DenseLayer, NetworkModel};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_ITERATIONS: usize = 5;
const WIDTHS: [usize; 6] = [32, 64, 128, 256, 512, 784];
const LANES: [usize; 5] = [1, 2, 4, 8, 16];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg(&args, "--iterations", DEFAULT_ITERATIONS).max(1);

    println!("nnacc cycle benchmark");
    println!("=====================");
    println!("Iterations : {iterations}");
    println!();

    println!("Width sweep (4 lanes)");
    println!(
        "  {:>16}  {:>10}  {:>10}  {:>12}",
        "topology", "cycles", "beats", "sim cyc/s"
    );
    println!("  {:-<16}  {:-<10}  {:-<10}  {:-<12}", "", "", "", "");
    for width in WIDTHS {
        let model = synthetic_model(&[width, width / 2, 10])?;
        let row = measure(&model, 4, iterations)?;
        println!(
            "  {:>16}  {:>10}  {:>10}  {:>12.0}",
            model.topology().to_string(),
            row.cycles,
            row.beats,
            row.cycles_per_sec
        );
    }
    println!();

    let mnist = synthetic_model(Topology::mnist().sizes())?;
    println!("Lane sweep ({})", mnist.topology());
    println!(
        "  {:>6}  {:>10}  {:>10}  {:>9}  {:>12}",
        "lanes", "cycles", "beats", "speedup", "sim cyc/s"
    );
    println!("  {:-<6}  {:-<10}  {:-<10}  {:-<9}  {:-<12}", "", "", "", "", "");
    let mut baseline: Option<u64> = None;
    for lanes in LANES {
        let row = measure(&mnist, lanes, iterations)?;
        let base = *baseline.get_or_insert(row.cycles);
        println!(
            "  {:>6}  {:>10}  {:>10}  {:>8.2}×  {:>12.0}",
            lanes,
            row.cycles,
            row.beats,
            base as f64 / row.cycles as f64,
            row.cycles_per_sec
        );
    }

    Ok(())
}

struct Row {
    cycles: u64,
    beats: usize,
    cycles_per_sec: f64,
}

fn measure(model: &NetworkModel, lanes: usize, iterations: usize) -> Result<Row> {
    let config = AcceleratorConfig::default().with_num_parallel(lanes);
    let mut cycle = CycleBackend::new(config.clone())?;
    let mut soft = SoftwareBackend::new(config)?;
    let input = ramp(model.topology().input_size(), 17);
    let stream = model.stream(&input, lanes)?;

    let t0 = Instant::now();
    let mut cycles = 0;
    let mut outputs = Vec::new();
    for _ in 0..iterations {
        outputs = cycle.infer(model.topology(), &stream)?;
        cycles = cycle.last_cycles().unwrap_or(0);
    }
    let elapsed = t0.elapsed().as_secs_f64();

    ensure!(
        outputs == soft.infer(model.topology(), &stream)?,
        "backends disagree on {}",
        model.topology()
    );
    ensure!(
        cycles == estimate_cycles(model.topology(), lanes),
        "cycle count {cycles} differs from estimate"
    );

    Ok(Row {
        cycles,
        beats: stream.len(),
        cycles_per_sec: (cycles * iterations as u64) as f64 / elapsed.max(1e-9),
    })
}

/// Model with small deterministic parameters.
fn synthetic_model(sizes: &[usize]) -> Result<NetworkModel> {
    let layers = sizes
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            DenseLayer::new(pair[0], pair[1], ramp(pair[0] * pair[1], 31 + i), ramp(pair[1], 7))
        })
        .collect::<nnacc_models::Result<Vec<_>>>()?;
    Ok(NetworkModel::new(layers)?)
}

/// Values in about ±0.06, cycling with `period`.
fn ramp(len: usize, period: usize) -> Vec<Fixed> {
    (0..len)
        .map(|i| Fixed::from_raw(((i % period) as i16 - (period / 2) as i16) * 8))
        .collect()
}

fn parse_arg(args: &[String], flag: &str, default: usize) -> usize {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
