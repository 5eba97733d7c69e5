use std::sync::{Arc, Barrier};
use std::thread;

use crate::support::helpers::{init_tracing, quiet_executor, RunCounter};
use anyhow::{anyhow, Result};
use batchpool::{ConsistencyError, ExecutorState};

#[test]
fn second_run_while_first_is_in_flight_is_rejected() -> Result<()> {
    init_tracing();
    let executor = Arc::new(quiet_executor(2));
    let started = Arc::new(Barrier::new(2));
    let finish = Arc::new(Barrier::new(2));
    {
        let started = Arc::clone(&started);
        let finish = Arc::clone(&finish);
        executor.register(
            move |_: ()| -> Result<()> {
                started.wait();
                finish.wait();
                Ok(())
            },
            [()],
        )?;
    }

    let runner = {
        let executor = Arc::clone(&executor);
        thread::spawn(move || executor.run())
    };
    started.wait();

    assert_eq!(executor.state(), ExecutorState::Running);
    let err = executor.run().expect_err("reentrant run must fail");
    assert_eq!(err.consistency(), Some(ConsistencyError::AlreadyRunning));
    let err = executor
        .register(|_: ()| Ok::<_, anyhow::Error>(()), [()])
        .expect_err("registration is closed while running");
    assert_eq!(err.consistency(), Some(ConsistencyError::RegisterWhileRunning));
    let err = executor.release().expect_err("release while running");
    assert_eq!(err.consistency(), Some(ConsistencyError::ReleaseWhileRunning));

    finish.wait();
    let summary = runner
        .join()
        .expect("runner thread should not panic")
        .expect("the in-flight batch is unaffected");
    assert_eq!(summary.completed, 1);
    assert_eq!(executor.state(), ExecutorState::Idle);

    executor.release()?;
    Ok(())
}

#[test]
fn run_from_inside_a_task_becomes_a_task_failure() -> Result<()> {
    let executor = Arc::new(quiet_executor(1));
    {
        let nested = Arc::clone(&executor);
        executor.register(
            move |_: ()| nested.run().map(drop),
            [()],
        )?;
    }

    let err = executor.run().expect_err("nested run fails the task");
    let failure = err.aggregated().expect("aggregated failure");
    assert_eq!(failure.count(), 1);
    assert!(
        err.to_string().contains("already running"),
        "unexpected report: {err}"
    );

    executor.release()?;
    Ok(())
}

#[test]
fn batch_after_failure_sees_no_leftovers() -> Result<()> {
    init_tracing();
    let executor = quiet_executor(3);
    let first_batch = RunCounter::default();
    {
        let first_batch = first_batch.clone();
        executor.register(
            move |index: usize| -> Result<()> {
                first_batch.hit();
                Err(anyhow!("first batch task {index}"))
            },
            0..3,
        )?;
    }
    let err = executor.run().expect_err("first batch fails");
    assert_eq!(err.aggregated().map(|failure| failure.count()), Some(3));
    assert_eq!(executor.state(), ExecutorState::Idle);
    assert_eq!(executor.pending_tasks(), 0);

    let second_batch = RunCounter::default();
    {
        let second_batch = second_batch.clone();
        executor.register(
            move |_: usize| -> Result<()> {
                second_batch.hit();
                Ok(())
            },
            0..2,
        )?;
    }
    let summary = executor.run()?;

    assert_eq!(summary.total, 2);
    assert_eq!(first_batch.get(), 3, "first batch tasks are not replayed");
    assert_eq!(second_batch.get(), 2);

    executor.register(
        |index: usize| -> Result<()> { Err(anyhow!("third batch task {index}")) },
        [7],
    )?;
    let err = executor.run().expect_err("third batch fails");
    let failure = err.aggregated().expect("aggregated failure");
    assert_eq!(failure.count(), 1, "only this batch's errors are reported");
    assert!(err.to_string().contains("third batch task 7"));

    let telemetry = executor.telemetry();
    assert_eq!(telemetry.batches_completed, 1);
    assert_eq!(telemetry.batches_failed, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_callers_run_batches_through_spawn_blocking() -> Result<()> {
    let executor = Arc::new(quiet_executor(2));
    let counter = RunCounter::default();
    {
        let counter = counter.clone();
        executor.register(
            move |_: u32| -> Result<()> {
                counter.hit();
                Ok(())
            },
            0..6,
        )?;
    }

    let summary = {
        let executor = Arc::clone(&executor);
        tokio::task::spawn_blocking(move || executor.run()).await??
    };

    assert_eq!(summary.completed, 6);
    assert_eq!(counter.get(), 6);
    executor.release()?;
    Ok(())
}

#[tokio::test]
async fn run_called_directly_on_a_runtime_thread_drains_large_batches() -> Result<()> {
    const TASKS: usize = 1_000;
    let executor = quiet_executor(2);
    let counter = RunCounter::default();
    {
        let counter = counter.clone();
        executor.register(
            move |_: usize| -> Result<()> {
                counter.hit();
                Ok(())
            },
            0..TASKS,
        )?;
    }

    // Far more completions than tokio's per-task coop budget.
    let summary = executor.run()?;

    assert_eq!(summary.completed, TASKS);
    assert_eq!(counter.get(), TASKS);
    executor.release()?;
    Ok(())
}

#[test]
fn dropping_without_release_stops_the_workers() -> Result<()> {
    let counter = RunCounter::default();
    {
        let executor = quiet_executor(2);
        let counter = counter.clone();
        executor.register(
            move |_: u8| -> Result<()> {
                counter.hit();
                Ok(())
            },
            0..4,
        )?;
        executor.run()?;
    }

    assert_eq!(counter.get(), 4);
    Ok(())
}
