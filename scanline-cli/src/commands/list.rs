//! List command - show candidate device nodes

use anyhow::Result;
use scanline_core::{ConfigFile, SystemEnumerator};
use scanline_core::config::GpuSettings;

use super::print_hint;

/// List candidate device nodes and whether each one can be used
pub fn list(config: &ConfigFile) -> Result<()> {
    let mut config = config.clone();
    config.gpu = GpuSettings::disabled();

    let enumerator = SystemEnumerator::from_config(&config);
    let candidates = enumerator.discover().inspect_err(print_hint)?;

    println!("{:<24} {}", "Device", "Status");
    println!("{}", "-".repeat(60));

    for path in candidates {
        let status = match enumerator.open_candidate(&path) {
            Ok(device) => {
                let names: Vec<&str> = device.outputs().iter().map(|o| o.name.as_str()).collect();
                format!(
                    "usable, {} output{} ({})",
                    names.len(),
                    if names.len() == 1 { "" } else { "s" },
                    names.join(", ")
                )
            }
            Err(e) => e.to_string(),
        };
        println!("{:<24} {}", path.display(), status);
    }

    Ok(())
}
