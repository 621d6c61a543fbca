// SPDX-License-Identifier: AGPL-3.0-only

//! `nnacc`: command-line interface for the nnacc accelerator simulator.
//!
//! ```text
//! USAGE:
//!   nnacc infer --model <dir> --input <file.mem>   Run one inference
//!   nnacc lut [--value <x>]                        Inspect the activation table
//!   nnacc status                                   Register file after init
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nnacc_driver::regs;
use nnacc_driver::{
    select_backend_with_table, AcceleratorConfig, Accelerator, ActivationTable, BackendSelection,
    Fixed, NnDriver, Status, Topology,
};
use nnacc_models::{format_mem, read_mem, NetworkModel};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nnacc", about = "Fixed-point MLP accelerator simulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Tick-by-tick device model (reports cycles).
    Cycle,
    /// Functional model, bit-identical results.
    Software,
}

impl From<BackendArg> for BackendSelection {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cycle => Self::Cycle,
            BackendArg::Software => Self::Software,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one inference on a model directory.
    Infer {
        /// Directory with nn_model_config.h and the .mem parameter files.
        #[arg(long)]
        model: PathBuf,
        /// Input vector as a .mem file.
        #[arg(long)]
        input: PathBuf,
        /// Backend to run on.
        #[arg(long, value_enum, default_value = "cycle")]
        backend: BackendArg,
        /// Compute lanes.
        #[arg(long, default_value_t = nnacc_chip::topology::DEFAULT_NUM_PARALLEL)]
        parallel: usize,
        /// Bypass the activation table on every layer.
        #[arg(long)]
        linear: bool,
    },
    /// Print the table entry for a value, or the whole table in .mem form.
    Lut {
        /// Pre-activation value.
        #[arg(long, allow_hyphen_values = true)]
        value: Option<f32>,
    },
    /// Initialize a device and dump its registers.
    Status {
        /// Compute lanes.
        #[arg(long, default_value_t = nnacc_chip::topology::DEFAULT_NUM_PARALLEL)]
        parallel: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Infer {
            model,
            input,
            backend,
            parallel,
            linear,
        } => cmd_infer(&model, &input, backend, parallel, linear)?,
        Cmd::Lut { value } => cmd_lut(value),
        Cmd::Status { parallel } => cmd_status(parallel)?,
    }

    Ok(())
}

fn cmd_infer(
    model_dir: &Path,
    input_path: &Path,
    backend: BackendArg,
    parallel: usize,
    linear: bool,
) -> Result<()> {
    let model = NetworkModel::from_dir(model_dir)
        .with_context(|| format!("loading model from {}", model_dir.display()))?;
    let input = read_mem(input_path)
        .with_context(|| format!("reading input {}", input_path.display()))?;
    if input.len() != model.topology().input_size() {
        bail!(
            "input has {} values, model {} expects {}",
            input.len(),
            model.topology(),
            model.topology().input_size()
        );
    }

    let config = AcceleratorConfig::default()
        .with_num_parallel(parallel)
        .with_activation(!linear);
    tracing::debug!(?config, "accelerator configuration");
    let mut backend = select_backend_with_table(backend.into(), config, model.activation_table())?;
    let p = model.infer(backend.as_mut(), &input)?;

    println!("Model      : {} ({} parameters)", model.topology(), model.parameter_count());
    println!("Backend    : {}, {parallel} lanes", backend.backend_type());
    println!();
    for (i, v) in p.outputs.iter().enumerate() {
        let marker = if i == p.class { "  <" } else { "" };
        println!("  [{i:>2}] {:>8}  ({:04X}){marker}", v.to_string(), v.to_bits());
    }
    println!();
    println!("Class      : {}", p.class);
    println!("Confidence : {:.1}%", p.confidence * 100.0);
    if let Some(cycles) = p.cycles {
        println!("Cycles     : {cycles}");
    }
    Ok(())
}

fn cmd_lut(value: Option<f32>) {
    let table = ActivationTable::sigmoid();
    match value {
        Some(x) => {
            let fx = Fixed::from_f32(x);
            let addr = ActivationTable::address(fx);
            let y = table.read(addr);
            println!("x       : {fx} ({:04X})", fx.to_bits());
            println!("address : {addr}");
            println!("value   : {y} ({:04X})", y.to_bits());
            println!("sigmoid : {:.4}", 1.0 / (1.0 + (-fx.to_f32()).exp()));
        }
        None => print!(
            "{}",
            format_mem(
                table.entries(),
                Some("Sigmoid LUT: 1024 entries\nInput: -8.0 to +8.0, Output: 0.0 to 1.0")
            )
        ),
    }
}

fn cmd_status(parallel: usize) -> Result<()> {
    let dev = Accelerator::new(AcceleratorConfig::default().with_num_parallel(parallel))?;
    let mut driver = NnDriver::new(dev);
    driver.init(&Topology::mnist())?;
    let dev = driver.device();

    let named = [
        ("CTRL", regs::CTRL),
        ("STATUS", regs::STATUS),
        ("NUM_IN", regs::NUM_IN),
        ("NUM_H1", regs::NUM_H1),
        ("NUM_H2", regs::NUM_H2),
        ("NUM_OUT", regs::NUM_OUT),
        ("NUM_LAYERS", regs::NUM_LAYERS),
    ];
    for (name, offset) in named {
        println!("{offset:#04x}  {name:<10}  {:#010x}", dev.read32(offset)?);
    }
    println!();
    let status: Status = driver.status();
    println!("Status     : {status}");
    println!("Topology   : {}", dev.sequencer().topology());
    println!("Lanes      : {parallel}");
    println!("Cycles     : {}", dev.cycles());
    Ok(())
}
