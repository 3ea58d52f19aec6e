// src/generation.rs
use thiserror::Error;

/// Id of one refresh pass. Later passes always get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("refresh {generation} superseded by {latest}")]
pub struct StaleRefresh {
    pub generation: Generation,
    pub latest: Generation,
}

/// Tracks which refresh was initiated last. Only that one may be applied.
#[derive(Debug, Default)]
pub struct GenerationGate {
    initiated: u64,
    applied: Option<u64>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> Generation {
        self.initiated += 1;
        Generation(self.initiated)
    }

    pub fn latest(&self) -> Option<Generation> {
        (self.initiated > 0).then_some(Generation(self.initiated))
    }

    pub fn last_applied(&self) -> Option<Generation> {
        self.applied.map(Generation)
    }

    /// Whether `generation` is still the newest pass and has not been applied yet.
    pub fn check(&self, generation: Generation) -> Result<(), StaleRefresh> {
        let latest = Generation(self.initiated);
        if self.initiated == 0 || generation != latest || self.applied == Some(generation.0) {
            return Err(StaleRefresh { generation, latest });
        }
        Ok(())
    }

    /// Accept a completed pass if nothing newer has been initiated since.
    pub fn accept(&mut self, generation: Generation) -> Result<(), StaleRefresh> {
        self.check(generation)?;
        self.applied = Some(generation.0);
        Ok(())
    }
}

/// A completed pass travelling back to the loop that applies results.
#[derive(Debug)]
pub struct Tagged<T> {
    pub generation: Generation,
    pub result: T,
}
