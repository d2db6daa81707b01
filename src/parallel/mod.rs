pub mod batch;
pub mod pool;

pub use batch::{run_rounds_parallel, simulate_battles_parallel, Engagement};
pub use pool::WorkerPool;
