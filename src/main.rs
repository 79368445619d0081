//! rsa-cl: encrypt and decrypt one message on an OpenCL device.
//!
//! Reads `p q e message [d]` from a plain-text configuration file, runs the
//! `encrypt` kernel followed by the `decrypt` kernel on the resulting
//! ciphertext, and writes both values as decimal text lines to the output
//! file. Any setup or device failure terminates the process with a non-zero
//! exit code.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

use rsa_cl::{KeyMaterial, OpenClBackend, Result, RunConfig};

/// OpenCL-offloaded RSA encryption and decryption.
#[derive(Parser)]
#[command(name = "rsa-cl", version, about)]
struct Args {
    /// Configuration file with whitespace-separated tokens: p q e message [d]
    conf_file: PathBuf,

    /// Output file; receives ciphertext and plaintext, one decimal line each
    outfile: PathBuf,

    /// OpenCL kernel source exposing the `encrypt` and `decrypt` entry points
    #[arg(long, default_value = "rsa_kernel.cl")]
    kernel: PathBuf,

    /// GPU device index
    #[arg(long, default_value_t = 0)]
    device: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // env_logger reports at error level by default, so this reaches
            // stderr without RUST_LOG being set.
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let started = Instant::now();

    let kernel_source = fs::read_to_string(&args.kernel)?;

    let config = RunConfig::from_file(&args.conf_file)?;
    let (p, q, message) = config.operands()?;
    let key = KeyMaterial::assemble(p, q, config.public_exponent, config.private_exponent)?;
    info!(
        "input: p={} q={} e={} M={}",
        key.p, key.q, key.public_exponent, message
    );

    // Output must be writable before any device work is committed.
    let mut outfile = fs::File::create(&args.outfile)?;

    let backend = OpenClBackend::new(&kernel_source, args.device)?;

    let ciphertext = backend.run_encryption(&key.p, &key.q, &message, key.public_exponent)?;
    info!("ciphertext: {ciphertext}");

    let plaintext = backend.run_decryption(&key.p, &key.q, &ciphertext, key.private_exponent)?;
    info!("plaintext: {plaintext}");

    writeln!(outfile, "{ciphertext}")?;
    writeln!(outfile, "{plaintext}")?;

    info!("completed in {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}
