pub mod events;
pub mod manager;
pub mod task;
pub mod worker;

pub use events::{QueueEvent, RunOutcome, RunSummary};
pub use manager::{QueueManager, RunState};
pub use task::{DownloadTask, TaskId, TaskQueue, TaskRequest, TaskState, TimeRange};
pub use worker::{Worker, WorkerConfig};
