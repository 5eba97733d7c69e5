use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::support::helpers::{init_tracing, quiet_executor, RunCounter, ValueError};
use anyhow::{anyhow, Result};
use batchpool::{BatchExecutor, ExecutorError, FailureKind};

#[test]
fn five_sleeping_tasks_complete_without_error() -> Result<()> {
    init_tracing();
    let executor = quiet_executor(3);
    let counter = RunCounter::default();
    {
        let counter = counter.clone();
        executor.register(
            move |millis: u64| -> Result<()> {
                thread::sleep(Duration::from_millis(millis));
                counter.hit();
                Ok(())
            },
            [10, 20, 5, 15, 10],
        )?;
    }

    let summary = executor.run()?;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(counter.get(), 5);
    assert_eq!(executor.telemetry().batches_completed, 1);
    executor.release()?;
    Ok(())
}

#[test]
fn failing_second_task_is_reported_once_after_all_tasks_ran() -> Result<()> {
    init_tracing();
    let executor = quiet_executor(2);
    let counter = RunCounter::default();
    {
        let counter = counter.clone();
        executor.register(
            move |index: usize| {
                counter.hit();
                if index == 1 {
                    return Err(ValueError("bad".into()));
                }
                Ok(index)
            },
            0..3,
        )?;
    }

    let err = executor.run().expect_err("the batch should fail");
    let failure = err.aggregated().expect("task failures are aggregated");

    assert_eq!(failure.count(), 1);
    assert_eq!(failure.failures()[0].task_id().index(), 1);
    assert_eq!(failure.summary().completed, 3, "progress covers failed tasks too");
    assert_eq!(counter.get(), 3, "no early abort");
    let message = err.to_string();
    assert!(message.contains("bad"), "unexpected report: {message}");
    assert!(message.starts_with("1 error occurred:\nERROR: "));
    executor.release()?;
    Ok(())
}

#[test]
fn empty_batch_completes_immediately() -> Result<()> {
    let executor = BatchExecutor::new(true)?;

    let summary = executor.run()?;

    assert_eq!(summary.total, 0);
    assert_eq!(summary.completed, 0);
    assert_eq!(executor.telemetry().tasks_submitted, 0);
    executor.release()?;
    Ok(())
}

#[test]
fn reported_count_matches_number_of_failing_tasks() -> Result<()> {
    init_tracing();
    let executor = quiet_executor(4);

    for (total, failing) in [(1, 0), (1, 1), (8, 3), (20, 20), (32, 0), (50, 17)] {
        executor.register(
            move |index: usize| {
                if index < failing {
                    Err(anyhow!("task {index} of {total} failed"))
                } else {
                    Ok(())
                }
            },
            0..total,
        )?;

        match executor.run() {
            Ok(summary) => {
                assert_eq!(failing, 0, "{total}/{failing} should have failed");
                assert_eq!(summary.completed, total);
            }
            Err(ExecutorError::Failed(failure)) => {
                assert_eq!(failure.count(), failing, "{total}/{failing}");
                assert_eq!(failure.summary().completed, total);
                let ids: BTreeSet<usize> = failure
                    .failures()
                    .iter()
                    .map(|failure| failure.task_id().index())
                    .collect();
                assert_eq!(ids, (0..failing).collect::<BTreeSet<_>>());
            }
            Err(other) => panic!("unexpected error for {total}/{failing}: {other}"),
        }
    }

    executor.release()?;
    Ok(())
}

#[test]
fn many_workers_failing_concurrently_lose_nothing() -> Result<()> {
    const TASKS: usize = 400;
    let executor = quiet_executor(8);
    executor.register(
        |index: usize| -> Result<()> {
            if index % 7 == 0 {
                thread::yield_now();
            }
            Err(anyhow!("failure {index}"))
        },
        0..TASKS,
    )?;

    let err = executor.run().expect_err("every task fails");
    let failure = err.aggregated().expect("aggregated failure");

    assert_eq!(failure.count(), TASKS);
    assert_eq!(err.to_string().lines().count(), TASKS + 1);
    assert_eq!(executor.telemetry().tasks_failed, TASKS as u64);
    Ok(())
}

#[test]
fn panicking_tasks_are_contained_and_workers_survive() -> Result<()> {
    init_tracing();
    let executor = quiet_executor(2);
    executor.register(
        |value: u32| -> Result<u32> {
            if value % 2 == 0 {
                panic!("even value {value}");
            }
            Ok(value)
        },
        0..6,
    )?;

    let err = executor.run().expect_err("panics are task failures");
    let failure = err.aggregated().expect("aggregated failure");
    assert_eq!(failure.count(), 3);
    assert!(failure
        .failures()
        .iter()
        .all(|failure| failure.kind() == FailureKind::Panic));
    assert!(err.to_string().contains("panicked: even value 4"));

    executor.register(|_: ()| Ok::<_, anyhow::Error>(()), vec![(); 4])?;
    let summary = executor.run()?;
    assert_eq!(summary.completed, 4, "both workers are still alive");
    assert_eq!(executor.telemetry().tasks_panicked, 3);
    Ok(())
}

#[test]
fn positional_arguments_reach_the_callable() -> Result<()> {
    let executor = quiet_executor(2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        executor.register(
            move |(name, copies): (String, usize)| -> Result<()> {
                seen.lock().expect("seen lock").push(name.repeat(copies));
                Ok(())
            },
            vec![("ab".to_string(), 2), ("c".to_string(), 3), ("".to_string(), 9)],
        )?;
    }

    executor.run()?;

    let mut seen = seen.lock().expect("seen lock").clone();
    seen.sort();
    assert_eq!(seen, vec!["".to_string(), "abab".into(), "ccc".into()]);
    Ok(())
}
