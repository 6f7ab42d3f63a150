//! The worker-side execution protocol: poll for work, apply the
//! user-supplied map/reduce functions, produce intermediate and final
//! files using atomic rename.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tarpc::context;
use tracing::{debug, info};

use crate::mr::apps::{MapFn, ReduceFn};
use crate::mr::coordinator::CoordinatorRpcClient;
use crate::mr::error::WorkerError;
use crate::mr::record::{self, partition_for_key, KeyValue};
use crate::mr::rpc::{GetTaskArgs, TaskError, TaskFinishedArgs, TaskType};

/// Drives one task at a time to completion. A worker process is
/// sequential — exactly one task in flight — so nothing here needs to be
/// shared across threads.
pub struct Worker {
    client: CoordinatorRpcClient,
    map_fn: MapFn,
    reduce_fn: ReduceFn,
    work_dir: PathBuf,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        client: CoordinatorRpcClient,
        map_fn: MapFn,
        reduce_fn: ReduceFn,
        work_dir: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            map_fn,
            reduce_fn,
            work_dir: work_dir.into(),
            poll_interval,
        }
    }

    /// Ask for a task, execute it, report completion, repeat until told
    /// the job is done. Any transport-level failure is fatal to this
    /// worker process.
    pub async fn run(&self) -> Result<(), WorkerError> {
        loop {
            let reply = self
                .client
                .get_task(context::current(), GetTaskArgs)
                .await?;

            match reply.error {
                TaskError::Wait => {
                    debug!("no task ready, backing off");
                    tokio::time::sleep(self.poll_interval).await;
                }
                TaskError::Done => {
                    info!("coordinator reports the job is done, exiting");
                    return Ok(());
                }
                TaskError::Error => {
                    return Err(WorkerError::Protocol(
                        "coordinator rejected GetTask as malformed".into(),
                    ));
                }
                TaskError::None => {
                    let task_type = reply.task_type.ok_or_else(|| {
                        WorkerError::Protocol("assignment missing task_type".into())
                    })?;
                    let task_id = reply.task_id.ok_or_else(|| {
                        WorkerError::Protocol("assignment missing task_id".into())
                    })?;

                    let output_files = match task_type {
                        TaskType::Map => map_task(
                            self.map_fn,
                            &self.work_dir,
                            &task_id,
                            &reply.input_files,
                            reply.n_reduce,
                        )?,
                        TaskType::Reduce => vec![reduce_task(
                            self.reduce_fn,
                            &self.work_dir,
                            &task_id,
                            &reply.input_files,
                        )?],
                    };

                    self.client
                        .task_finished(
                            context::current(),
                            TaskFinishedArgs {
                                task_type,
                                task_id,
                                output_files,
                            },
                        )
                        .await?;
                }
            }
        }
    }
}

/// Reads the one input file for a map task, applies `map_fn`, and
/// partitions the resulting records into `n_reduce` intermediate files
/// named `mr-<taskId>-<partition>`. Every partition file is created even
/// if no key hashed to it, so the exactly-once-per-partition invariant
/// holds regardless of key distribution.
pub fn map_task(
    map_fn: MapFn,
    work_dir: &Path,
    task_id: &str,
    input_files: &[String],
    n_reduce: usize,
) -> Result<Vec<String>, WorkerError> {
    let filename = input_files
        .first()
        .ok_or_else(|| WorkerError::Protocol("map assignment has no input file".into()))?;

    debug!(task_id, file = %filename, "running map task");
    let contents = std::fs::read_to_string(filename)?;
    let records = map_fn(filename, &contents);

    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce];
    for kv in records {
        let partition = partition_for_key(&kv.key, n_reduce);
        buckets[partition].push(kv);
    }

    let mut outputs = Vec::with_capacity(n_reduce);
    for (partition, bucket) in buckets.into_iter().enumerate() {
        let final_name = format!("mr-{task_id}-{partition}");
        write_atomically(work_dir, &final_name, |w| {
            for kv in &bucket {
                record::write_record(&mut *w, kv)?;
            }
            Ok(())
        })?;
        outputs.push(final_name);
    }

    info!(task_id, n_reduce, "map task finished");
    Ok(outputs)
}

/// Reads every intermediate file for a reduce partition, groups records
/// by key, and writes one `key value` line per group to `mr-out-<taskId>`.
pub fn reduce_task(
    reduce_fn: ReduceFn,
    work_dir: &Path,
    task_id: &str,
    input_files: &[String],
) -> Result<String, WorkerError> {
    debug!(task_id, inputs = input_files.len(), "running reduce task");

    let mut records = Vec::new();
    for filename in input_files {
        let file = File::open(work_dir.join(filename))?;
        records.extend(record::read_records(BufReader::new(file))?);
    }
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let final_name = format!("mr-out-{task_id}");
    write_atomically(work_dir, &final_name, |w| {
        let mut i = 0;
        while i < records.len() {
            let mut j = i + 1;
            while j < records.len() && records[j].key == records[i].key {
                j += 1;
            }
            let values: Vec<String> = records[i..j].iter().map(|r| r.value.clone()).collect();
            let reduced = reduce_fn(&records[i].key, &values);
            writeln!(w, "{} {}", records[i].key, reduced)?;
            i = j;
        }
        Ok(())
    })?;

    info!(task_id, "reduce task finished");
    Ok(final_name)
}

/// Writes via a temporary file in `work_dir`, then renames it into place.
/// No filename visible to the coordinator or a later reduce worker ever
/// points at a partially written file.
fn write_atomically(
    work_dir: &Path,
    final_name: &str,
    write: impl FnOnce(&mut dyn std::io::Write) -> std::io::Result<()>,
) -> Result<(), WorkerError> {
    let temp = tempfile::Builder::new()
        .prefix(".tmp-mr-")
        .tempfile_in(work_dir)?;
    {
        let mut w = BufWriter::new(temp.as_file());
        write(&mut w)?;
        w.flush()?;
    }
    temp.persist(work_dir.join(final_name))
        .map_err(|e| WorkerError::Io(e.error))?;
    Ok(())
}
