//! Running-process probes for telemetry enrichment
//!
//! Resources in the process family (`ssh`, `nmap`, `ping` by default) stand
//! for external programs. Their telemetry carries the number of such
//! programs currently running, as reported by a [`ProcessProbe`].

use std::ffi::OsStr;
use std::sync::Mutex;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Reports how many OS processes of a family are running
pub trait ProcessProbe: Send + Sync {
    /// `None` when the count cannot be determined
    fn running(&self, resource: &str) -> Option<u64>;
}

/// Adapter turning a closure into a probe
pub struct FnProbe<F>(pub F);

impl<F> ProcessProbe for FnProbe<F>
where
    F: Fn(&str) -> Option<u64> + Send + Sync,
{
    fn running(&self, resource: &str) -> Option<u64> {
        (self.0)(resource)
    }
}

/// Counts running processes whose name equals the resource name, using the
/// process table kept by `sysinfo`
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe").finish_non_exhaustive()
    }
}

impl ProcessProbe for SystemProbe {
    fn running(&self, resource: &str) -> Option<u64> {
        let Ok(mut system) = self.system.lock() else {
            tracing::warn!(resource, "process table lock poisoned");
            return None;
        };
        // names and pids only; cpu, memory and disk stats are not needed
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        let count = system
            .processes_by_exact_name(OsStr::new(resource))
            .filter(|process| process.thread_kind().is_none())
            .count();
        u64::try_from(count).ok()
    }
}
