//! Drives a full pipeline in-process: map tasks over real files on disk,
//! feed the coordinator's state machine directly through its public RPC
//! trait (no socket, no worker binary), then reduce and check the final
//! output files. This exercises the same GetTask/TaskFinished protocol a
//! real worker speaks, without spawning one.

use std::time::Duration;

use map_reduce_rs::mr::apps;
use map_reduce_rs::mr::coordinator::{Coordinator, CoordinatorRpc};
use map_reduce_rs::mr::rpc::{GetTaskArgs, TaskError, TaskFinishedArgs, TaskType};
use map_reduce_rs::mr::worker::{map_task, reduce_task};
use tarpc::context;

async fn run_to_completion(coordinator: &Coordinator, app: &str, work_dir: &std::path::Path) {
    let (map_fn, reduce_fn) = apps::lookup(app).unwrap();
    loop {
        let reply = coordinator
            .clone()
            .get_task(context::current(), GetTaskArgs)
            .await;
        match reply.error {
            TaskError::Done => return,
            TaskError::Wait => panic!("no worker left to unblock the job; would hang"),
            TaskError::Error => panic!("coordinator rejected GetTask"),
            TaskError::None => {
                let task_type = reply.task_type.unwrap();
                let task_id = reply.task_id.unwrap();
                let output_files = match task_type {
                    TaskType::Map => {
                        map_task(map_fn, work_dir, &task_id, &reply.input_files, reply.n_reduce)
                            .unwrap()
                    }
                    TaskType::Reduce => {
                        vec![reduce_task(reduce_fn, work_dir, &task_id, &reply.input_files).unwrap()]
                    }
                };
                coordinator
                    .clone()
                    .task_finished(
                        context::current(),
                        TaskFinishedArgs {
                            task_type,
                            task_id,
                            output_files,
                        },
                    )
                    .await;
            }
        }
    }
}

#[tokio::test]
async fn single_input_nreduce_one_word_count() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.txt");
    std::fs::write(&input, "a b a").unwrap();

    let coordinator = Coordinator::new(
        vec![input.to_str().unwrap().to_string()],
        1,
        Duration::from_secs(10),
    );

    run_to_completion(&coordinator, "wc", dir.path()).await;
    assert!(coordinator.done());

    let out = std::fs::read_to_string(dir.path().join("mr-out-0")).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["a 2", "b 1"]);
}

#[tokio::test]
async fn two_inputs_two_partitions_word_count() {
    let dir = tempfile::tempdir().unwrap();
    let input_a = dir.path().join("a.txt");
    let input_b = dir.path().join("b.txt");
    std::fs::write(&input_a, "x y x").unwrap();
    std::fs::write(&input_b, "y z").unwrap();

    let coordinator = Coordinator::new(
        vec![
            input_a.to_str().unwrap().to_string(),
            input_b.to_str().unwrap().to_string(),
        ],
        2,
        Duration::from_secs(10),
    );

    run_to_completion(&coordinator, "wc", dir.path()).await;
    assert!(coordinator.done());

    let mut counts = std::collections::HashMap::new();
    for partition in 0..2 {
        let out = std::fs::read_to_string(dir.path().join(format!("mr-out-{partition}"))).unwrap();
        for line in out.lines() {
            let (key, value) = line.split_once(' ').unwrap();
            counts.insert(key.to_string(), value.to_string());
        }
    }
    assert_eq!(counts.get("x").map(String::as_str), Some("2"));
    assert_eq!(counts.get("y").map(String::as_str), Some("2"));
    assert_eq!(counts.get("z").map(String::as_str), Some("1"));
    // Exactly one reduce task produced each key: every key appears in
    // exactly one of the two output files, never both or neither.
    assert_eq!(counts.len(), 3);
}

#[tokio::test]
async fn empty_input_set_completes_via_empty_reduces() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(vec![], 3, Duration::from_secs(10));

    run_to_completion(&coordinator, "wc", dir.path()).await;
    assert!(coordinator.done());

    for partition in 0..3 {
        let out = std::fs::read_to_string(dir.path().join(format!("mr-out-{partition}"))).unwrap();
        assert!(out.is_empty());
    }
}

#[tokio::test]
async fn indexer_app_produces_sorted_file_lists() {
    let dir = tempfile::tempdir().unwrap();
    let input_a = dir.path().join("a.txt");
    let input_b = dir.path().join("b.txt");
    std::fs::write(&input_a, "foo bar foo").unwrap();
    std::fs::write(&input_b, "bar").unwrap();

    let coordinator = Coordinator::new(
        vec![
            input_a.to_str().unwrap().to_string(),
            input_b.to_str().unwrap().to_string(),
        ],
        1,
        Duration::from_secs(10),
    );

    run_to_completion(&coordinator, "indexer", dir.path()).await;

    let out = std::fs::read_to_string(dir.path().join("mr-out-0")).unwrap();
    let bar_line = out.lines().find(|l| l.starts_with("bar ")).unwrap();
    assert!(bar_line.contains(input_a.to_str().unwrap()));
    assert!(bar_line.contains(input_b.to_str().unwrap()));
}
