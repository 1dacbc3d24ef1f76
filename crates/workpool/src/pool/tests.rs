use crate::{
    Error, Job, JobId, Outcome, PoolConfig, PoolReport, TaskError, TaskFn, WorkerPool, from_async,
    from_blocking, run_pool,
};
use futures::{StreamExt, stream::FusedStream};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

fn jobs(n: usize) -> Vec<Job> {
    (1..=n).map(|i| Job::from(format!("job-{i}"))).collect()
}

fn named(ids: &[&str]) -> Vec<Job> {
    ids.iter().copied().map(Job::from).collect()
}

fn uppercase_unless(
    failing: &'static [&'static str],
) -> impl TaskFn<(), Value = String, Error = String> {
    from_async(move |job: Job| async move {
        let id = job.id().as_str();
        if failing.iter().any(|f| *f == id) {
            Err("boom".to_string())
        } else {
            Ok(id.to_uppercase())
        }
    })
}

/// A task that parks on `gate` after bumping `started`.
fn gated(
    gate: &Arc<Semaphore>,
    started: &Arc<AtomicUsize>,
) -> impl TaskFn<(), Value = JobId, Error = &'static str> {
    let gate = Arc::clone(gate);
    let started = Arc::clone(started);
    from_async(move |job: Job| {
        let gate = Arc::clone(&gate);
        let started = Arc::clone(&started);
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err("gate closed"),
            }
            Ok(job.id().clone())
        }
    })
}

async fn wait_for(counter: &AtomicUsize, n: usize) {
    while counter.load(Ordering::SeqCst) < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn uppercases_successes_and_reports_boom() {
    let summary = run_pool(named(&["t1", "t2", "t3"]), uppercase_unless(&["t2"]), 2)
        .unwrap()
        .drain()
        .await;

    let mut successes = summary.successes.clone();
    successes.sort();
    assert_eq!(
        successes,
        [
            (JobId::from("t1"), "T1".to_string()),
            (JobId::from("t3"), "T3".to_string()),
        ]
    );
    assert_eq!(
        summary.failures,
        [(JobId::from("t2"), TaskError::Failed("boom".to_string()))]
    );
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.stats.drained, 3);
    assert_eq!(
        summary.report,
        PoolReport {
            workers: 2,
            enqueued: 3,
            processed: 3,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failing_tenant_out_of_six() {
    let tenants = named(&[
        "tenant-1", "tenant-2", "tenant-3", "tenant-4", "tenant-5", "tenant-6",
    ]);
    let summary = run_pool(tenants, uppercase_unless(&["tenant-2"]), 4)
        .unwrap()
        .drain()
        .await;

    assert_eq!(summary.successes.len(), 5);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0.as_str(), "tenant-2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_yields_exactly_one_outcome() {
    static EVERY_THIRD: &[&str] = &["job-3", "job-6", "job-9", "job-12", "job-15", "job-18"];

    for job_count in [0, 1, 7, 20] {
        for parallelism in [1, 3, 8] {
            let summary = run_pool(jobs(job_count), uppercase_unless(EVERY_THIRD), parallelism)
                .unwrap()
                .drain()
                .await;

            let expected_failures = (1..=job_count).filter(|i| i % 3 == 0).count();
            assert_eq!(summary.total(), job_count, "j={job_count} p={parallelism}");
            assert_eq!(summary.failures.len(), expected_failures);
            assert_eq!(summary.successes.len(), job_count - expected_failures);
            assert_eq!(summary.stats.drained, job_count);
            assert_eq!(
                summary.report,
                PoolReport {
                    workers: parallelism,
                    enqueued: job_count,
                    processed: job_count,
                }
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_job_is_delivered_twice() {
    let attempts: Arc<Mutex<HashMap<JobId, usize>>> = Arc::default();
    let task = {
        let attempts = Arc::clone(&attempts);
        from_async(move |job: Job| {
            let attempts = Arc::clone(&attempts);
            async move {
                *attempts
                    .lock()
                    .unwrap()
                    .entry(job.id().clone())
                    .or_default() += 1;
                tokio::task::yield_now().await;
                Ok::<_, ()>(job.id().clone())
            }
        })
    };

    let summary = run_pool(jobs(500), task, 8).unwrap().drain().await;

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 500);
    assert!(attempts.values().all(|&n| n == 1));

    let delivered: HashSet<JobId> = summary.successes.into_iter().map(|(id, _)| id).collect();
    assert_eq!(delivered.len(), 500);
}

#[tokio::test]
async fn cancelled_before_start_yields_nothing() {
    let pool = WorkerPool::new(uppercase_unless(&[]), PoolConfig::new(4).unwrap());
    pool.cancel_handle().cancel();

    let summary = pool.start(jobs(16)).drain().await;

    assert_eq!(summary.total(), 0);
    assert_eq!(
        summary.report,
        PoolReport {
            workers: 4,
            enqueued: 0,
            processed: 0,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_cancel_lets_in_flight_jobs_finish() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let handle = run_pool(jobs(10), gated(&gate, &started), 2).unwrap();

    wait_for(&started, 2).await;
    let cancel = handle.cancel_handle();
    cancel.cancel();
    cancel.cancel();
    handle.cancel();
    assert!(cancel.is_cancelled());

    gate.add_permits(10);
    let summary = handle.drain().await;

    // Both running invocations completed; nothing new was started.
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(summary.successes.len(), 2);
    assert_eq!(summary.report.processed, 2);
    assert_eq!(summary.stats.drained, 2);
    assert!(summary.report.enqueued <= 10);
}

#[tokio::test]
async fn parent_token_cancels_pool_but_not_the_reverse() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::with_parent(uppercase_unless(&[]), PoolConfig::new(2).unwrap(), &parent);
    let handle = pool.start(jobs(4));
    handle.cancel();
    assert!(!parent.is_cancelled());
    handle.drain().await;

    let pool = WorkerPool::with_parent(uppercase_unless(&[]), PoolConfig::new(2).unwrap(), &parent);
    parent.cancel();
    let summary = pool.start(jobs(4)).drain().await;
    assert_eq!(summary.total(), 0);
}

#[tokio::test]
async fn panicking_task_does_not_kill_worker() {
    let task = from_async(|job: Job| async move {
        if job.id().as_str() == "panic" {
            panic!("bad job");
        }
        Ok::<_, ()>(job.id().clone())
    });

    let summary = run_pool(named(&["a", "panic", "b"]), task, 1)
        .unwrap()
        .drain()
        .await;

    assert_eq!(summary.successes.len(), 2);
    assert_eq!(
        summary.failures,
        [(
            JobId::from("panic"),
            TaskError::Panicked {
                message: "bad job".to_string()
            }
        )]
    );
}

#[tokio::test]
async fn early_cancel_handle_controls_a_parented_pool() {
    let parent = CancellationToken::new();
    let pool = WorkerPool::with_parent(uppercase_unless(&[]), PoolConfig::new(2).unwrap(), &parent);
    let early = pool.cancel_handle();
    early.cancel();

    let summary = pool.start(jobs(4)).drain().await;

    assert!(early.is_cancelled());
    assert!(!parent.is_cancelled());
    assert_eq!(summary.total(), 0);
    assert_eq!(summary.report.processed, 0);
}

#[tokio::test]
async fn panic_before_the_future_is_built_is_contained() {
    let task = from_async(|job: Job| {
        if job.id().as_str() == "panic" {
            panic!("rejected before start");
        }
        async move { Ok::<_, ()>(job.id().clone()) }
    });

    let summary = run_pool(named(&["a", "panic", "b", "c"]), task, 1)
        .unwrap()
        .drain()
        .await;

    assert_eq!(summary.total(), 4);
    let mut successes: Vec<_> = summary.successes.iter().map(|(id, _)| id.as_str()).collect();
    successes.sort_unstable();
    assert_eq!(successes, ["a", "b", "c"]);
    assert_eq!(
        summary.failures,
        [(
            JobId::from("panic"),
            TaskError::Panicked {
                message: "rejected before start".to_string()
            }
        )]
    );
    // The lone worker survived and accounted for every outcome it sent.
    assert_eq!(summary.report.workers, 1);
    assert_eq!(summary.report.processed, summary.stats.drained);
    assert_eq!(summary.report.processed, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_task_function() {
    let task = from_blocking(|job: Job| {
        std::thread::sleep(Duration::from_millis(2));
        match job.id().as_str() {
            "t2" => Err("boom"),
            id => Ok(id.to_uppercase()),
        }
    });

    let summary = run_pool(named(&["t1", "t2", "t3"]), task, 2)
        .unwrap()
        .drain()
        .await;

    let mut successes: Vec<_> = summary.successes.into_iter().map(|(_, v)| v).collect();
    successes.sort();
    assert_eq!(successes, ["T1", "T3"]);
    assert_eq!(
        summary.failures,
        [(JobId::from("t2"), TaskError::Failed("boom"))]
    );
}

#[tokio::test]
async fn slow_consumer_does_not_deadlock() {
    // Every job fails so the failure queue, sized to the worker count, is the
    // one under pressure.
    let task = from_async(|job: Job| async move { Err::<(), _>(job.id().clone()) });
    let (mut outcomes, _cancel) = run_pool(jobs(20), task, 2).unwrap().into_parts();

    let mut failures = 0;
    while let Some(outcome) = outcomes.next().await {
        assert!(outcome.is_failure());
        failures += 1;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(failures, 20);
}

#[tokio::test]
async fn exhausted_pool_stream_stays_quiet() {
    let mut handle = run_pool(jobs(5), uppercase_unless(&["job-2"]), 2).unwrap();
    let outcomes = handle.outcomes();

    let collected: Vec<Outcome<String, String>> = outcomes.by_ref().collect().await;
    assert_eq!(collected.len(), 5);
    assert!(outcomes.is_terminated());

    let polls = outcomes.stats().receiver_polls;
    for _ in 0..1_000 {
        assert!(outcomes.next().await.is_none());
    }
    assert_eq!(outcomes.stats().receiver_polls, polls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_outcomes_cancels_the_pool() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let (outcomes, cancel) = run_pool(jobs(10), gated(&gate, &started), 2)
        .unwrap()
        .into_parts();

    wait_for(&started, 2).await;
    drop(outcomes);
    assert!(cancel.is_cancelled());

    gate.add_permits(10);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_parallelism_is_rejected_without_a_runtime() {
    let err = run_pool(jobs(3), uppercase_unless(&[]), 0).err();
    assert_eq!(err, Some(Error::InvalidParallelism { parallelism: 0 }));
}
