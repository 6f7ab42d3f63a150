//! The narrow request/reply protocol binding coordinator and worker.
//!
//! Four message types, as in the authoritative source's `rpc.go`:
//! `GetTaskArgs`/`GetTaskReply` and `TaskFinishedArgs`/`TaskFinishedReply`.
//! The exact wire encoding is an external concern (`tokio_serde` JSON
//! framing over a loopback TCP stream); only the two peers need to agree
//! on it.

use serde::{Deserialize, Serialize};

/// Which phase a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Map,
    Reduce,
}

/// The four-way outcome of a `GetTask` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskError {
    /// An assignment is present in the reply.
    None,
    /// No task is ready right now; the caller should back off and retry.
    Wait,
    /// All work has been assigned and nothing remains ready; caller should exit.
    Done,
    /// Reserved for malformed requests.
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTaskArgs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskReply {
    pub error: TaskError,
    pub task_type: Option<TaskType>,
    pub task_id: Option<String>,
    pub input_files: Vec<String>,
    pub n_reduce: usize,
}

impl GetTaskReply {
    pub fn wait() -> Self {
        Self {
            error: TaskError::Wait,
            task_type: None,
            task_id: None,
            input_files: Vec::new(),
            n_reduce: 0,
        }
    }

    pub fn done() -> Self {
        Self {
            error: TaskError::Done,
            task_type: None,
            task_id: None,
            input_files: Vec::new(),
            n_reduce: 0,
        }
    }

    pub fn assignment(
        task_type: TaskType,
        task_id: impl Into<String>,
        input_files: Vec<String>,
        n_reduce: usize,
    ) -> Self {
        Self {
            error: TaskError::None,
            task_type: Some(task_type),
            task_id: Some(task_id.into()),
            input_files,
            n_reduce,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFinishedArgs {
    pub task_type: TaskType,
    pub task_id: String,
    pub output_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFinishedReply;
