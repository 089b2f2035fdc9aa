//! Concurrent callers sharing one manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_rotation::services::rotation::{ManualClock, Orchestrator, ProviderFailure};
use api_rotation::utils::RetryConfig;
use futures::future::join_all;

mod common;

use common::{credential, manager_with};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_selection_accounts_every_request() {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = Arc::new(manager_with(
        clock,
        (1..=4)
            .map(|i| credential("qwen", &format!("qwen_{}", i), 0))
            .collect(),
    ));

    let tasks = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut selected = 0u64;
            for _ in 0..100 {
                if let Some(handle) = manager.select("qwen") {
                    selected += 1;
                    tokio::task::yield_now().await;
                    manager.report_success(&handle);
                }
            }
            selected
        })
    });

    let selected: u64 = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .sum();
    assert_eq!(selected, 800);

    let report = manager.service_report("qwen").unwrap();
    assert_eq!(report.summary.total_requests, 800);
    let successes: u64 = report.apis.iter().map(|a| a.successes).sum();
    assert_eq!(successes, 800);
    // Round robin spreads load evenly
    for api in &report.apis {
        assert_eq!(api.total_requests, 200);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_orchestrated_calls() {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = Arc::new(manager_with(
        clock,
        vec![
            credential("qwen", "qwen_1", 0),
            credential("qwen", "qwen_2", 0),
            credential("gemini", "gemini_1", 0),
        ],
    ));
    let orchestrator = Orchestrator::new(manager.clone()).with_retry(
        RetryConfig::key_rotation()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter(Duration::from_millis(1)),
    );
    let calls = Arc::new(AtomicU64::new(0));

    let runs = (0..20).map(|i| {
        let orchestrator = orchestrator.clone();
        let calls = calls.clone();
        async move {
            orchestrator
                .execute("qwen", move |handle| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        if handle.name == "qwen_2" && i % 2 == 0 {
                            Err(ProviderFailure::message("connection reset by peer"))
                        } else {
                            Ok(handle.name)
                        }
                    }
                })
                .await
        }
    });

    let results = join_all(runs).await;
    assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);
    assert!(calls.load(Ordering::SeqCst) >= 20);

    let report = manager.status_report();
    for service in report.services.values() {
        assert_eq!(
            service.active + service.rate_limited + service.error + service.offline,
            service.total_apis
        );
    }
}
