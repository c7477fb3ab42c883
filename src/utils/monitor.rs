use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Elapsed time of one pipeline phase.
#[derive(Debug, Clone)]
pub struct PhaseTiming {
    pub phase: String,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
struct ProcessSampler {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    sampler: Option<Mutex<ProcessSampler>>,
    start_time: Instant,
    enabled: bool,
}

impl SystemMonitor {
    #[cfg(feature = "cli")]
    pub fn new(enabled: bool) -> Self {
        // 取不到 PID 時只記錄耗時
        let sampler = if enabled {
            sysinfo::get_current_pid().ok().map(|pid| {
                let mut system = System::new();
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                Mutex::new(ProcessSampler {
                    system,
                    pid,
                    peak_memory_mb: 0,
                })
            })
        } else {
            None
        };

        Self {
            sampler,
            start_time: Instant::now(),
            enabled,
        }
    }

    #[cfg(not(feature = "cli"))]
    pub fn new(enabled: bool) -> Self {
        Self {
            start_time: Instant::now(),
            enabled,
        }
    }

    #[cfg(feature = "cli")]
    pub fn get_stats(&self) -> Option<SystemStats> {
        let mut sampler = self.sampler.as_ref()?.lock().ok()?;
        let pid = sampler.pid;
        sampler
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let (cpu_usage, memory_mb) = {
            let process = sampler.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        sampler.peak_memory_mb = sampler.peak_memory_mb.max(memory_mb);

        Some(SystemStats {
            cpu_usage,
            memory_usage_mb: memory_mb,
            peak_memory_mb: sampler.peak_memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    /// 每個階段結束時呼叫，回傳該階段耗時
    pub fn finish_phase(&self, phase: &str, started: Instant) -> PhaseTiming {
        let timing = PhaseTiming {
            phase: phase.to_string(),
            elapsed: started.elapsed(),
        };
        tracing::info!("⏱️ {} finished in {:?}", phase, timing.elapsed);
        self.log_stats(phase);
        timing
    }

    pub fn log_stats(&self, phase: &str) {
        if self.enabled {
            self.log_sample(phase);
        }
    }

    #[cfg(feature = "cli")]
    fn log_sample(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    #[cfg(not(feature = "cli"))]
    fn log_sample(&self, _phase: &str) {}

    pub fn log_final_stats(&self, timings: &[PhaseTiming]) {
        let total = self.start_time.elapsed();
        let breakdown = timings
            .iter()
            .map(|t| format!("{}={:?}", t.phase, t.elapsed))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!("📊 Final Stats - Total Time: {:?} ({})", total, breakdown);
        if let Some(peak) = self.peak_memory_mb() {
            tracing::info!("📊 Peak Memory: {}MB", peak);
        }
    }

    #[cfg(feature = "cli")]
    fn peak_memory_mb(&self) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        self.get_stats().map(|stats| stats.peak_memory_mb)
    }

    #[cfg(not(feature = "cli"))]
    fn peak_memory_mb(&self) -> Option<u64> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_phase_records_name() {
        let monitor = SystemMonitor::new(false);
        let started = Instant::now();
        let timing = monitor.finish_phase("extract", started);
        assert_eq!(timing.phase, "extract");
        assert!(!monitor.is_enabled());
    }
}
