//! Probe command - open a device and report outputs and GPU binding

use anyhow::Result;
use clap::Args;
use scanline_core::{ConfigFile, DeviceReport, SystemEnumerator};

use super::print_hint;

/// Arguments for the probe command
#[derive(Args)]
pub struct ProbeArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip GPU binding
    #[arg(long)]
    pub no_gpu: bool,

    /// Validate Vulkan usage with validation layers when installed
    #[arg(long)]
    pub validation: bool,
}

/// Open the first usable device and print its report
pub fn probe(args: ProbeArgs, mut config: ConfigFile) -> Result<()> {
    if args.no_gpu {
        config.gpu.enabled = false;
    }
    if args.validation {
        config.gpu.validation = true;
    }

    let enumerator = SystemEnumerator::from_config(&config);
    let device = enumerator.open().inspect_err(print_hint)?;
    let report = DeviceReport::from_device(&device);

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
        if let Some(reason) = device.gpu().reason() {
            print_hint(reason);
        }
    }

    Ok(())
}
