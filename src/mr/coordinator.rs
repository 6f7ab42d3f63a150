//! The coordinator's task-assignment and liveness state machine.
//!
//! A single coarse mutex guards all state. `get_task`/`task_finished` are
//! exposed over RPC (see [`CoordinatorRpc`]); `done` is a local query the
//! owning process polls directly, never over the wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{ready, Ready};
use tarpc::context;
use tracing::{debug, info, warn};

use crate::mr::error::CoordinatorError;
use crate::mr::rpc::{
    GetTaskArgs, GetTaskReply, TaskError, TaskFinishedArgs, TaskFinishedReply, TaskType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Ready,
    Started,
    Done,
}

#[derive(Debug)]
struct MapTask {
    id: u32,
    status: TaskStatus,
}

struct State {
    /// Input filenames in a fixed, deterministic order (spec.md's
    /// iteration-order note allows either; a deterministic order makes the
    /// scheduler's behavior reproducible in tests).
    input_order: Vec<String>,
    map_tasks: HashMap<String, MapTask>,
    id_to_filename: HashMap<u32, String>,
    next_map_id: u32,
    map_done: bool,

    n_reduce: usize,
    reduce_status: Vec<TaskStatus>,
    reduce_files: Vec<Vec<String>>,
}

impl State {
    fn recompute_map_done(&mut self) -> bool {
        self.map_done = self
            .map_tasks
            .values()
            .all(|t| t.status == TaskStatus::Done);
        self.map_done
    }

    fn reduce_done(&self) -> bool {
        self.reduce_status.iter().all(|s| *s == TaskStatus::Done)
    }
}

/// Parses the partition suffix out of an intermediate filename: every
/// trailing decimal digit run after the final `-`, which (unlike reading
/// only the last character) stays correct for any `NReduce`.
fn parse_partition_suffix(filename: &str) -> Result<usize, CoordinatorError> {
    let dash = filename
        .rfind('-')
        .ok_or_else(|| CoordinatorError::MissingPartitionSuffix(filename.to_string()))?;
    let digits = &filename[dash + 1..];
    digits
        .parse::<usize>()
        .map_err(|_| CoordinatorError::InvalidPartitionSuffix(filename.to_string()))
}

/// Singleton holder of the job's global state.
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<State>>,
    timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator for `files`, `n_reduce` reduce partitions, and
    /// watchdog deadline `timeout` (spec.md's `D`, default 10s).
    pub fn new(files: Vec<String>, n_reduce: usize, timeout: Duration) -> Self {
        assert!(n_reduce > 0, "n_reduce must be positive");
        let map_done = files.is_empty();
        let state = State {
            input_order: files,
            map_tasks: HashMap::new(),
            id_to_filename: HashMap::new(),
            next_map_id: 0,
            map_done,
            n_reduce,
            reduce_status: vec![TaskStatus::Ready; n_reduce],
            reduce_files: vec![Vec::new(); n_reduce],
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            timeout,
        }
    }

    /// True iff every map task and every reduce task is `done`. Polled
    /// locally by the owning process; never exposed over RPC.
    pub fn done(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.map_done && state.reduce_done()
    }

    fn get_task_impl(&self) -> GetTaskReply {
        let mut state = self.state.lock().unwrap();

        if !state.map_done {
            let ready_filename = state
                .input_order
                .iter()
                .find(|f| {
                    state
                        .map_tasks
                        .get(*f)
                        .map(|t| t.status == TaskStatus::Ready)
                        .unwrap_or(true) // never dispatched yet => ready
                })
                .cloned();

            if let Some(filename) = ready_filename {
                let id = match state.map_tasks.get(&filename) {
                    Some(task) => task.id,
                    None => {
                        let id = state.next_map_id;
                        state.next_map_id += 1;
                        state.id_to_filename.insert(id, filename.clone());
                        id
                    }
                };
                state.map_tasks.insert(
                    filename.clone(),
                    MapTask {
                        id,
                        status: TaskStatus::Started,
                    },
                );
                let n_reduce = state.n_reduce;
                drop(state);

                debug!(task_id = id, file = %filename, "assigned map task");
                self.arm_map_watchdog(id, filename.clone());
                return GetTaskReply::assignment(
                    TaskType::Map,
                    id.to_string(),
                    vec![filename],
                    n_reduce,
                );
            }

            if !state.recompute_map_done() {
                return GetTaskReply::wait();
            }
            info!("map phase complete, reduce phase may begin");
        }

        let ready_partition = state
            .reduce_status
            .iter()
            .position(|s| *s == TaskStatus::Ready);

        if let Some(partition) = ready_partition {
            state.reduce_status[partition] = TaskStatus::Started;
            let input_files = state.reduce_files[partition].clone();
            drop(state);

            debug!(partition, "assigned reduce task");
            self.arm_reduce_watchdog(partition);
            return GetTaskReply::assignment(
                TaskType::Reduce,
                partition.to_string(),
                input_files,
                0,
            );
        }

        if state.reduce_done() {
            GetTaskReply::done()
        } else {
            // At least one reduce task is `started` but not `done`; returning
            // WAIT here (rather than DONE) is the stricter resolution of the
            // "premature DONE" open question: a caller told DONE could exit
            // before the last watchdog-reassignable reduce task is served.
            GetTaskReply::wait()
        }
    }

    fn task_finished_impl(&self, args: TaskFinishedArgs) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        match args.task_type {
            TaskType::Map => {
                let id: u32 = args
                    .task_id
                    .parse()
                    .map_err(|_| CoordinatorError::InvalidTaskId(args.task_id.clone()))?;
                let filename = state
                    .id_to_filename
                    .get(&id)
                    .cloned()
                    .ok_or(CoordinatorError::UnknownTaskId(id))?;

                let already_done = state
                    .map_tasks
                    .get(&filename)
                    .map(|t| t.status == TaskStatus::Done)
                    .unwrap_or(false);
                if already_done {
                    // Duplicate completion (e.g. a reassigned worker racing
                    // the original); drop it so the partition file lists
                    // never double-count an intermediate file.
                    warn!(task_id = id, "dropping duplicate map completion");
                    return Ok(());
                }

                let n_reduce = state.n_reduce;
                for f in &args.output_files {
                    let partition = parse_partition_suffix(f)?;
                    if partition >= n_reduce {
                        return Err(CoordinatorError::PartitionOutOfRange {
                            partition,
                            n_reduce,
                        });
                    }
                }

                if let Some(task) = state.map_tasks.get_mut(&filename) {
                    task.status = TaskStatus::Done;
                }
                for f in args.output_files {
                    let partition = parse_partition_suffix(&f)?;
                    state.reduce_files[partition].push(f);
                }
                state.recompute_map_done();
                info!(task_id = id, file = %filename, "map task finished");
            }
            TaskType::Reduce => {
                let partition: usize = args
                    .task_id
                    .parse()
                    .map_err(|_| CoordinatorError::InvalidTaskId(args.task_id.clone()))?;
                if partition >= state.reduce_status.len() {
                    return Err(CoordinatorError::PartitionOutOfRange {
                        partition,
                        n_reduce: state.reduce_status.len(),
                    });
                }
                // Unconditional: dropping a second ack is harmless, the
                // final output file already exists from the first writer.
                state.reduce_status[partition] = TaskStatus::Done;
                info!(partition, "reduce task finished");
            }
        }
        Ok(())
    }

    fn arm_map_watchdog(&self, id: u32, filename: String) {
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = state.lock().unwrap();
            if let Some(task) = state.map_tasks.get_mut(&filename) {
                if task.id == id && task.status != TaskStatus::Done {
                    warn!(task_id = id, file = %filename, "map watchdog fired, reassigning");
                    task.status = TaskStatus::Ready;
                }
            }
        });
    }

    fn arm_reduce_watchdog(&self, partition: usize) {
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = state.lock().unwrap();
            if state.reduce_status[partition] != TaskStatus::Done {
                warn!(partition, "reduce watchdog fired, reassigning");
                state.reduce_status[partition] = TaskStatus::Ready;
            }
        });
    }
}

/// RPC surface exposed to workers: `GetTask` and `TaskFinished`.
#[tarpc::service]
pub trait CoordinatorRpc {
    async fn get_task(args: GetTaskArgs) -> GetTaskReply;
    async fn task_finished(args: TaskFinishedArgs) -> TaskFinishedReply;
}

#[tarpc::server]
impl CoordinatorRpc for Coordinator {
    type GetTaskFut = Ready<GetTaskReply>;
    type TaskFinishedFut = Ready<TaskFinishedReply>;

    fn get_task(self, _: context::Context, _args: GetTaskArgs) -> Self::GetTaskFut {
        ready(self.get_task_impl())
    }

    fn task_finished(self, _: context::Context, args: TaskFinishedArgs) -> Self::TaskFinishedFut {
        if let Err(e) = self.task_finished_impl(args) {
            // Input-format errors are fatal to the coordinator per the
            // design's error taxonomy: there is no structured error channel
            // on TaskFinishedReply, so the process terminates directly.
            tracing::error!("fatal coordinator error: {e}");
            std::process::exit(1);
        }
        ready(TaskFinishedReply)
    }
}
