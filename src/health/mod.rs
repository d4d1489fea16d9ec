// src/health/mod.rs
mod checker;
mod probe;
mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{CycleReport, HealthChecker};
pub use probe::{HttpProbe, Probe, ProbeError, ProbeReport, ProbeResult};
pub use status::{CheckerState, ServiceHealth, ServiceId, Services, UnknownService};
