//! Where snapshots come from and where outcomes go.

pub mod file;
#[cfg(feature = "sim")]
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{CycleOutcome, SensorSnapshot};

pub use file::FileSnapshotSource;
#[cfg(feature = "sim")]
pub use crate::config::SimulatedHouseConfig;
#[cfg(feature = "sim")]
pub use simulated::SimulatedHouse;

/// Collaborator that supplies one snapshot per cycle and receives the result
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read_snapshot(&self) -> Result<SensorSnapshot>;
    async fn publish(&self, outcome: &CycleOutcome) -> Result<()>;
}
