//! Integration tests for the beacon AT command firmware.
//!
//! Run within 10 s of a device reset, before the AT mode times out.

mod device;
mod protocol;

use clap::Parser;
use colored::Colorize;

use device::{resolve_port, DeviceClient};
use tests::{print_results, run_all_tests, run_mode_timeout_test};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the beacon AT command firmware")]
struct Args {
    /// Serial port for the device (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Only check that AT mode times out, needs a fresh reset and an explicit port
    #[arg(long)]
    mode_timeout: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.mode_timeout && args.port == "auto" {
        // Auto-detection sends AT, which would cancel the timeout
        anyhow::bail!("--mode-timeout needs an explicit --port");
    }
    let port = resolve_port(&args.port)?;

    println!("{}", "Beacon AT Integration Tests".bold());
    println!("Port: {}", port);
    println!("Baud: {}", args.baud);
    println!();

    println!("Connecting to device...");
    let mut device = DeviceClient::new(&port, args.baud)?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = if args.mode_timeout {
        run_mode_timeout_test(&mut device)
    } else {
        device.drain_buffer()?;
        run_all_tests(&mut device)
    };
    print_results(&results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
