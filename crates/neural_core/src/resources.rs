//! Cosmetic resource simulation.
//!
//! Each tick relaxes CPU toward a status-dependent target and recomputes
//! memory, VFS size and the process list from the live file system. Nothing
//! in the pipeline reads these numbers back.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::FileSystem;
use crate::state::Resources;
use crate::status::AgentStatus;

/// Tuning knobs for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Tick period in milliseconds
    pub tick_ms: u64,
    /// Fraction of the remaining distance to the target covered per tick (0-1)
    pub smoothing: f64,
    /// CPU target while settled
    pub idle_cpu: f64,
    /// CPU target during LLM-bound stages
    pub active_cpu: f64,
    /// CPU target while compiling or healing
    pub build_cpu: f64,
    /// Memory baseline in MB
    pub memory_baseline: f64,
    /// Extra MB per file in the virtual file system
    pub memory_per_file: f64,
    /// Extra MB while a stage is running
    pub memory_active_offset: f64,
    /// Uniform jitter amplitude in MB
    pub memory_jitter: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1500,
            smoothing: 0.2,
            idle_cpu: 4.0,
            active_cpu: 68.0,
            build_cpu: 92.0,
            memory_baseline: 256.0,
            memory_per_file: 12.5,
            memory_active_offset: 180.0,
            memory_jitter: 8.0,
        }
    }
}

const BASE_PROCESSES: [&str; 3] = ["neural-kernel", "vfs-daemon", "preview-server"];

/// Pure tick function over [`Resources`].
#[derive(Debug, Clone)]
pub struct ResourceSimulator {
    config: SimulatorConfig,
}

impl ResourceSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// CPU value the simulator relaxes toward for `status`.
    pub fn cpu_target(&self, status: AgentStatus) -> f64 {
        let target = match status {
            AgentStatus::Compiling | AgentStatus::Healing => self.config.build_cpu,
            s if s.is_active() => self.config.active_cpu,
            _ => self.config.idle_cpu,
        };
        target.clamp(0.0, 100.0)
    }

    /// Advance `resources` by one tick.
    pub fn tick<R: Rng + ?Sized>(
        &self,
        resources: &mut Resources,
        files: &FileSystem,
        status: AgentStatus,
        rng: &mut R,
    ) {
        let alpha = self.config.smoothing.clamp(0.0, 1.0);
        let target = self.cpu_target(status);
        let cpu = resources.cpu.max(0.0);
        resources.cpu = cpu + (target - cpu) * alpha;

        let offset = if status.is_active() {
            self.config.memory_active_offset
        } else {
            0.0
        };
        let amplitude = self.config.memory_jitter.abs();
        let jitter = if amplitude > 0.0 {
            rng.gen_range(-amplitude..=amplitude)
        } else {
            0.0
        };
        resources.memory = (self.config.memory_baseline
            + files.len() as f64 * self.config.memory_per_file
            + offset
            + jitter)
            .max(0.0);

        let bytes: usize = files.values().map(String::len).sum();
        resources.vfs_size = bytes as f64 / 1024.0;

        resources.processes = processes_for(status);
    }
}

impl Default for ResourceSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

/// Fixed process list plus synthetic names for the running stage.
pub fn processes_for(status: AgentStatus) -> Vec<String> {
    let mut processes: Vec<String> = BASE_PROCESSES.iter().map(|p| p.to_string()).collect();
    let extra: &[&str] = match status {
        AgentStatus::Managing => &["agent-manager"],
        AgentStatus::Planning => &["agent-planner"],
        AgentStatus::Designing => &["agent-designer", "token-compiler"],
        AgentStatus::Architecting => &["agent-architect", "vfs-writer"],
        AgentStatus::Coding => &["agent-coder", "vfs-writer", "lsp-worker"],
        AgentStatus::Reviewing => &["agent-reviewer", "static-analyzer"],
        AgentStatus::Compiling => &["tsc --build", "bundler"],
        AgentStatus::Healing => &["agent-patcher", "tsc --incremental"],
        AgentStatus::Idle | AgentStatus::Ready | AgentStatus::Error => &[],
    };
    processes.extend(extra.iter().map(|p| p.to_string()));
    processes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn files(n: usize) -> FileSystem {
        (0..n).map(|i| (format!("f{}.ts", i), "x".repeat(1024))).collect()
    }

    #[test]
    fn test_cpu_converges_without_overshoot() {
        let sim = ResourceSimulator::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut res = Resources::default();
        let target = sim.cpu_target(AgentStatus::Coding);

        let mut previous = res.cpu;
        for _ in 0..60 {
            sim.tick(&mut res, &files(3), AgentStatus::Coding, &mut rng);
            assert!(res.cpu <= target);
            assert!(res.cpu >= previous);
            previous = res.cpu;
        }
        assert!((target - res.cpu).abs() < 0.01);
    }

    #[test]
    fn test_cpu_relaxes_down_to_idle() {
        let sim = ResourceSimulator::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut res = Resources {
            cpu: 95.0,
            ..Default::default()
        };
        let target = sim.cpu_target(AgentStatus::Ready);
        for _ in 0..80 {
            sim.tick(&mut res, &FileSystem::new(), AgentStatus::Ready, &mut rng);
            assert!(res.cpu >= target);
        }
        assert!((res.cpu - target).abs() < 0.01);
    }

    #[test]
    fn test_values_never_negative() {
        let sim = ResourceSimulator::new(SimulatorConfig {
            memory_baseline: 0.0,
            memory_per_file: 0.0,
            memory_jitter: 50.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(42);
        let mut res = Resources {
            cpu: -10.0,
            ..Default::default()
        };
        for _ in 0..200 {
            sim.tick(&mut res, &FileSystem::new(), AgentStatus::Idle, &mut rng);
            assert!(res.cpu >= 0.0);
            assert!(res.memory >= 0.0);
        }
    }

    #[test]
    fn test_vfs_size_in_kilobytes() {
        let sim = ResourceSimulator::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut res = Resources::default();
        sim.tick(&mut res, &files(4), AgentStatus::Idle, &mut rng);
        assert_eq!(res.vfs_size, 4.0);
    }

    #[test]
    fn test_process_list_by_stage() {
        assert_eq!(processes_for(AgentStatus::Idle).len(), BASE_PROCESSES.len());
        assert!(processes_for(AgentStatus::Coding).contains(&"agent-coder".to_string()));
    }
}
