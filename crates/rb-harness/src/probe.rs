//! Memory usage sampling.

use std::fs;

/// Optional memory-usage probe; `None` when the environment exposes nothing.
pub trait MemoryProbe {
    /// Current usage in MiB.
    fn sample_mb(&self) -> Option<f64>;
}

/// Resident set size from `/proc/self/status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn sample_mb(&self) -> Option<f64> {
        let status = fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// Probe for environments without memory introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl MemoryProbe for NoProbe {
    fn sample_mb(&self) -> Option<f64> {
        None
    }
}

/// Best probe for this platform.
pub fn default_probe() -> Box<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Box::new(ProcStatusProbe)
    } else {
        Box::new(NoProbe)
    }
}

/// Extract `VmRSS` (reported in kB) as MiB.
pub fn parse_vm_rss(status: &str) -> Option<f64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let kb: f64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some(unit) if !unit.eq_ignore_ascii_case("kB") => None,
        _ => Some(kb / 1024.0),
    }
}
