//! CLI command implementations

mod config;
mod list;
mod probe;

pub use config::{ConfigArgs, config};
pub use list::list;
pub use probe::{ProbeArgs, probe};

use scanline_core::ScanlineError;

/// Print the remediation hint for an error, if there is one
pub(crate) fn print_hint(err: &ScanlineError) {
    if let Some(hint) = err.user_hint() {
        eprintln!("hint: {}", hint);
    }
}
