use std::sync::Arc;
use std::time::Instant;

/// Source of the current process resident memory
pub trait MemoryProbe: Send + Sync {
    fn resident_bytes(&self) -> Option<u64>;
}

/// Resident set size read from the `VmRSS` line of `/proc/self/status`
/// (Linux). The kernel reports it in kB, so the page size does not matter.
#[derive(Debug, Clone, Default)]
pub struct ProcStatus;

impl ProcStatus {
    const PATH: &'static str = "/proc/self/status";

    /// Available only when the status file can be read
    pub fn detect() -> Option<Self> {
        Self.resident_bytes().map(|_| Self)
    }
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let kb: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(kb * 1024),
        Some(_) => None,
    }
}

impl MemoryProbe for ProcStatus {
    fn resident_bytes(&self) -> Option<u64> {
        parse_vm_rss(&std::fs::read_to_string(Self::PATH).ok()?)
    }
}

/// Logs wall time, and memory delta when a probe is available, of wrapped
/// calls
#[derive(Clone, Default)]
pub struct Timing {
    memory: Option<Arc<dyn MemoryProbe>>,
}

impl Timing {
    pub fn new(memory: Option<Arc<dyn MemoryProbe>>) -> Self {
        Self { memory }
    }

    /// Resolve the memory probe once for this process
    pub fn detect() -> Self {
        match ProcStatus::detect() {
            Some(probe) => Self::new(Some(Arc::new(probe))),
            None => {
                log::warn!("Process memory statistics unavailable. Disabling memory monitor");
                Self::new(None)
            }
        }
    }

    pub fn monitors_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Run `f` and log `timing <name> : <secs>s. mem: <delta>Mb`
    pub fn run<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let start_rss = self.memory.as_ref().and_then(|m| m.resident_bytes());
        let start = Instant::now();

        let result = f();

        let elapsed = start.elapsed().as_secs_f64();
        let end_rss = self.memory.as_ref().and_then(|m| m.resident_bytes());
        log::debug!("{}", format_timing(name, elapsed, start_rss.zip(end_rss)));
        result
    }
}

fn format_timing(name: &str, elapsed: f64, rss: Option<(u64, u64)>) -> String {
    let mem = match rss {
        Some((start, end)) => format!(
            "mem: {:+.1}Mb",
            (end as f64 - start as f64) / (1024.0 * 1024.0)
        ),
        None => String::new(),
    };
    format!("timing {} : {:.2}s. {}", name, elapsed, mem)
}
