/// Health-check engine
///
/// Leaf first:
/// - `cache`: last verdict per URL with a TTL
/// - `checker`: the network probe behind the `Prober` seam
/// - `executor`: one check per call, cache first, never fails
/// - `batch`: windowed "check everything now"
/// - `scheduler`: recurring cycles with transition tracking and stats
pub mod batch;
pub mod cache;
pub mod checker;
pub mod entropy;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use batch::{BatchChecker, BatchReport};
pub use cache::ProbeCache;
pub use checker::{HttpProber, Prober};
pub use entropy::{Entropy, SeededEntropy, ThreadEntropy};
pub use executor::{FallbackPolicy, ProbeExecutor};
pub use scheduler::{CycleStats, RealtimeScheduler, SchedulerStatus};
pub use types::{ProbeStatus, ProbeVerdict, UrlStatus};
