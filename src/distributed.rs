//! Rank gating for multi-process deployments
//!
//! Tensor-parallel engines may run one harness process per rank. Only the
//! reporting rank (rank 0) prints averages and writes the report; the
//! harness never talks to the other ranks itself.

use crate::error::{invalid_config, BenchResult};

/// Environment variable holding the global rank (torchrun convention)
pub const RANK_ENV: &str = "RANK";

/// Fallback when only the node-local rank is exported
pub const LOCAL_RANK_ENV: &str = "LOCAL_RANK";

/// Environment variable holding the number of ranks
pub const WORLD_SIZE_ENV: &str = "WORLD_SIZE";

/// Answers "is this process the reporting rank?"
pub trait RankGate {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    fn is_reporting_rank(&self) -> bool {
        self.rank() == 0
    }
}

/// A single process is rank 0 of 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleProcess;

impl RankGate for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }
}

/// Rank read from the launcher's environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvRank {
    rank: usize,
    world_size: usize,
}

impl EnvRank {
    /// Read `RANK` (or `LOCAL_RANK`) and `WORLD_SIZE`.
    ///
    /// Missing variables mean a single-process run. Present but malformed
    /// values, or a rank outside the world, are configuration errors.
    pub fn from_env() -> BenchResult<Self> {
        let rank = match read_usize(RANK_ENV)? {
            Some(rank) => rank,
            None => read_usize(LOCAL_RANK_ENV)?.unwrap_or(0),
        };
        let world_size = read_usize(WORLD_SIZE_ENV)?.unwrap_or(1);
        Self::new(rank, world_size)
    }

    pub fn new(rank: usize, world_size: usize) -> BenchResult<Self> {
        if world_size == 0 {
            return Err(invalid_config("world size must be at least 1"));
        }
        if rank >= world_size {
            return Err(invalid_config(format!(
                "rank {} is outside a world of size {}",
                rank, world_size
            )));
        }
        Ok(EnvRank { rank, world_size })
    }
}

impl RankGate for EnvRank {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }
}

fn read_usize(var: &str) -> BenchResult<Option<usize>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| invalid_config(format!("{}='{}': {}", var, raw, e))),
        Err(_) => Ok(None),
    }
}
