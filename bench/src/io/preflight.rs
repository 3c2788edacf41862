//! Agent binary availability probe.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::core::types::CommandSpec;
use crate::io::process::{ProcessRequest, run_process};

pub const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether `command -v <binary>` succeeds in a POSIX shell.
pub fn binary_available(binary: &str) -> Result<bool> {
    // The binary is passed as `$1`, never spliced into the script.
    let spec = CommandSpec::new("sh", ["-c", "command -v \"$1\"", "sh", binary]);
    let result = run_process(&ProcessRequest::new(spec, PREFLIGHT_TIMEOUT))?;
    debug!(binary, available = result.succeeded(), "binary probed");
    Ok(result.succeeded())
}

/// Probe each distinct binary once; fail listing every missing one.
#[instrument(skip_all)]
pub fn ensure_binaries<'a, I>(binaries: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = binaries.into_iter().collect();
    let mut missing = Vec::new();
    for binary in distinct {
        if !binary_available(binary)? {
            missing.push(binary);
        }
    }
    if !missing.is_empty() {
        bail!("required agent binaries not found on PATH: {}", missing.join(", "));
    }
    Ok(())
}
