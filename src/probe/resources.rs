//! Per-process and host resource sampling via `sysinfo`.

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, System};

/// CPU and memory usage of one instance's process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
    /// Share of total host memory.
    pub memory_percent: f64,
}

/// Host-level resource information, sampled once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
    pub cpu_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
}

impl SystemInfo {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_total as f64 * 100.0
        }
    }
}

/// Shared sampler. `sysinfo` computes CPU usage from the difference between
/// two refreshes, so the same `System` must be reused across cycles.
#[derive(Debug)]
pub struct ResourceSampler {
    system: Mutex<System>,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Sample one process. Returns `None` if the process cannot be read.
    pub fn sample(&self, pid: u32) -> Option<ResourceUsage> {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();

        // `refresh_process` returns false if the process is gone
        if !system.refresh_process(pid) {
            return None;
        }
        system.refresh_memory();
        let total = system.total_memory();
        let process = system.process(pid)?;

        let memory_bytes = process.memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            memory_bytes as f64 / total as f64 * 100.0
        };

        Some(ResourceUsage {
            cpu_percent: process.cpu_usage() as f64,
            memory_bytes,
            memory_percent,
        })
    }

    /// Sample host CPU and memory.
    pub fn system_info(&self) -> SystemInfo {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        SystemInfo {
            cpu_count: system.cpus().len(),
            cpu_percent: system.global_cpu_info().cpu_usage() as f64,
            memory_total: system.total_memory(),
            memory_used: system.used_memory(),
        }
    }
}
