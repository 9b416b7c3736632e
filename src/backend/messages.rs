use crate::queue::{QueueEvent, TaskId, TaskRequest};

/// Commands sent from the front end to the backend
#[derive(Debug, Clone)]
pub enum BackendCommand {
    Enqueue(TaskRequest),
    /// Fetch the title of a URL for preview
    ResolveTitle {
        url: String,
    },
    Start,
    Stop,
    HardReset,
    /// Update the extraction tool in place
    UpdateCore,
    // System
    Shutdown,
}

/// Events sent from the backend to the front end
#[derive(Debug, Clone)]
pub enum BackendEvent {
    TaskAdded {
        task_id: TaskId,
        request: TaskRequest,
    },
    TitleResolved {
        url: String,
        title: Result<String, String>,
    },
    Queue(QueueEvent),
    UpdateFinished(Result<String, String>),

    // System
    Error(String),
}
