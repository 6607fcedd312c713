//! Resource limits for local build containers.
//!
//! Several architectures may build at the same time, so each container gets
//! a bounded share of the host instead of competing for all of it.

use sysinfo::System;

/// Minimum memory a Go + cgo build needs, in megabytes
const MIN_MEMORY_MB: u64 = 512;
/// Sanity ceiling for memory, in megabytes (1 TB)
const MAX_MEMORY_MB: u64 = 1024 * 1024;

/// Memory, CPU and process limits applied to `docker run` / `podman run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLimits {
    /// Maximum memory (e.g., "4g", "2048m")
    pub memory: String,

    /// Maximum memory + swap (e.g., "6g", "3072m")
    pub memory_swap: String,

    /// Number of CPUs (fractional allowed, e.g., "2", "1.5")
    pub cpus: String,

    /// Maximum number of processes
    pub pids_limit: u32,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        Self::detect_safe_limits()
    }
}

impl ContainerLimits {
    /// Limits derived from the host.
    ///
    /// - Memory: 50% of total RAM, clamped to 2..=16 GB
    /// - Swap: memory + 2 GB
    /// - CPUs: 50% of cores, at least 2
    /// - PIDs: 1000
    pub fn detect_safe_limits() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let total_ram_gb = sys.total_memory() / 1024 / 1024 / 1024;
        let memory_gb = (total_ram_gb / 2).clamp(2, 16);
        let cpu_limit = (num_cpus::get() / 2).max(2);

        Self {
            memory: format!("{}g", memory_gb),
            memory_swap: format!("{}g", memory_gb + 2),
            cpus: cpu_limit.to_string(),
            pids_limit: 1000,
        }
    }

    /// Limits from explicit CLI values, validated.
    ///
    /// Swap defaults to memory + 2 GB and CPUs to every core.
    pub fn from_cli(
        memory: &str,
        memory_swap: Option<&str>,
        cpus: Option<&str>,
        pids_limit: u32,
    ) -> Result<Self, String> {
        let memory_mb = parse_memory_to_mb(memory)?;
        if memory_mb < MIN_MEMORY_MB {
            return Err(format!(
                "Memory limit too low: {} MB (minimum: {} MB)",
                memory_mb, MIN_MEMORY_MB
            ));
        }
        if memory_mb > MAX_MEMORY_MB {
            return Err(format!(
                "Memory limit too high: {} MB (maximum: 1 TB)",
                memory_mb
            ));
        }

        let memory_swap = match memory_swap {
            Some(swap) => {
                let swap_mb = parse_memory_to_mb(swap)?;
                if swap_mb < memory_mb {
                    return Err(format!(
                        "Memory swap ({} MB) must be >= memory ({} MB)",
                        swap_mb, memory_mb
                    ));
                }
                format!("{}m", swap_mb)
            }
            None => format!("{}m", memory_mb + 2048),
        };

        let cpus = match cpus {
            Some(cpus) => {
                let value: f32 = cpus.trim().parse().map_err(|_| {
                    format!(
                        "Invalid --cpus value: '{}' (expected number like '2' or '1.5')",
                        cpus
                    )
                })?;
                if value <= 0.0 {
                    return Err(format!("CPU limit must be positive, got: {}", value));
                }
                if value > 1024.0 {
                    return Err(format!("CPU limit too high: {} (maximum: 1024)", value));
                }
                cpus.trim().to_string()
            }
            None => num_cpus::get().to_string(),
        };

        if !(10..=1_000_000).contains(&pids_limit) {
            return Err(format!(
                "PID limit out of range: {} (allowed: 10 to 1,000,000)",
                pids_limit
            ));
        }

        Ok(Self {
            memory: memory.trim().to_string(),
            memory_swap,
            cpus,
            pids_limit,
        })
    }

    /// Flags for `run`
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--memory".to_string(),
            self.memory.clone(),
            "--memory-swap".to_string(),
            self.memory_swap.clone(),
            "--cpus".to_string(),
            self.cpus.clone(),
            "--pids-limit".to_string(),
            self.pids_limit.to_string(),
        ]
    }
}

/// Parse "4g", "4096m", "4GB", "2048" (megabytes) into megabytes.
fn parse_memory_to_mb(memory: &str) -> Result<u64, String> {
    let lowered = memory.trim().to_lowercase();
    let invalid = || format!("Invalid memory value: {}", memory.trim());

    let (digits, multiplier) = if let Some(value) = lowered
        .strip_suffix("gb")
        .or_else(|| lowered.strip_suffix('g'))
    {
        (value, 1024)
    } else if let Some(value) = lowered
        .strip_suffix("mb")
        .or_else(|| lowered.strip_suffix('m'))
    {
        (value, 1)
    } else {
        (lowered.as_str(), 1)
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(multiplier))
        .ok_or_else(invalid)
}
