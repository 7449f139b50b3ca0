use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pdfchat_model::ErrorKind as ModelErrorKind;
use pdfchat_store::{MemoryLogStore, Message, NewMessage, Sender};
use pdfchat_test_model::{PresetResponse, TestModelProvider};

use super::*;
use crate::error::ErrorKind;
use crate::report::CycleReport;

fn build_driver(model: &TestModelProvider, store: &MemoryLogStore) -> Driver {
    DriverBuilder::new(model.clone(), Arc::new(store.clone())).build()
}

fn segments(texts: &[&str]) -> Vec<TextSegment> {
    texts.iter().copied().map(TextSegment::new).collect()
}

fn contents<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<(Sender, String)> {
    messages
        .into_iter()
        .map(|msg| (msg.sender, msg.text.clone()))
        .collect()
}

async fn wait_until_busy(driver: &Driver) {
    while !driver.is_busy().await {
        tokio::task::yield_now().await;
    }
}

fn unwrap_batch(report: TurnReport) -> Vec<CycleReport> {
    match report {
        TurnReport::SegmentReplay(batch) => batch.cycles,
        other => panic!("expected a replay, got {other:?}"),
    }
}

#[tokio::test]
async fn test_segment_replay() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    driver.on_extraction_result(segments(&["a", "b", "c"]));
    let cycles = unwrap_batch(driver.submit_turn("Explain").await);
    assert_eq!(cycles.len(), 3);
    assert!(cycles.iter().all(|cycle| cycle.result.is_ok()));
    assert_eq!(
        cycles.iter().map(|cycle| cycle.index).collect::<Vec<_>>(),
        [0, 1, 2]
    );

    assert_eq!(model.prompts(), ["Explain\na", "Explain\nb", "Explain\nc"]);
    assert_eq!(
        contents(&store.records()),
        [
            (Sender::User, "Explain\na".to_owned()),
            (Sender::Bot, "You said Explain\na".to_owned()),
            (Sender::User, "Explain\nb".to_owned()),
            (Sender::Bot, "You said Explain\nb".to_owned()),
            (Sender::User, "Explain\nc".to_owned()),
            (Sender::Bot, "You said Explain\nc".to_owned()),
        ]
    );

    let snapshot = driver.snapshot().await.unwrap();
    assert!(snapshot.state.segments_consumed());
    assert!(snapshot.state.pending_segments().is_empty());
    assert!(!snapshot.state.is_busy());
}

#[tokio::test]
async fn test_empty_batch() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    driver.on_extraction_result(vec![]);
    let cycles = unwrap_batch(driver.submit_turn("Anything?").await);
    assert!(cycles.is_empty());
    assert!(model.prompts().is_empty());
    assert!(store.records().is_empty());

    let snapshot = driver.snapshot().await.unwrap();
    assert!(snapshot.state.segments_consumed());
    // The raw input is still mirrored.
    assert_eq!(
        contents(&snapshot.transcript),
        [(Sender::User, "Anything?".to_owned())]
    );

    // The next turn is an ordinary one.
    let report = driver.submit_turn("Hello").await;
    assert_eq!(report, TurnReport::SingleTurn(Ok(())));
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn test_single_turn_persists_bot_only() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    let report = driver.submit_turn("Hi").await;
    assert_eq!(report, TurnReport::SingleTurn(Ok(())));
    assert_eq!(model.prompts(), ["Hi"]);
    assert_eq!(
        contents(&store.records()),
        [(Sender::Bot, "You said Hi".to_owned())]
    );

    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(
        contents(&snapshot.transcript),
        [
            (Sender::User, "Hi".to_owned()),
            (Sender::Bot, "You said Hi".to_owned()),
        ]
    );
    assert!(snapshot.transcript.iter().all(|msg| msg.timestamp.is_none()));
}

#[tokio::test]
async fn test_model_failure_skips_one_cycle() {
    let mut model = TestModelProvider::default();
    model.add_rule("beta", PresetResponse::failure(ModelErrorKind::Unavailable));
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    driver.on_extraction_result(segments(&["alpha", "beta", "gamma"]));
    let cycles = unwrap_batch(driver.submit_turn("Go").await);
    assert!(cycles[0].result.is_ok());
    assert_eq!(
        cycles[1].result.as_ref().unwrap_err().kind(),
        ErrorKind::ModelUnavailable
    );
    assert!(cycles[2].result.is_ok());

    assert_eq!(
        contents(&store.records()),
        [
            (Sender::User, "Go\nalpha".to_owned()),
            (Sender::Bot, "You said Go\nalpha".to_owned()),
            (Sender::User, "Go\ngamma".to_owned()),
            (Sender::Bot, "You said Go\ngamma".to_owned()),
        ]
    );
    let snapshot = driver.snapshot().await.unwrap();
    assert!(snapshot.state.segments_consumed());
    assert!(!snapshot.state.is_busy());
}

#[tokio::test]
async fn test_moderated_reply_leaves_user_turn() {
    let mut model = TestModelProvider::default();
    model.add_rule(
        "forbidden",
        PresetResponse::failure(ModelErrorKind::Moderated),
    );
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    let report = driver.submit_turn("something forbidden").await;
    let TurnReport::SingleTurn(Err(err)) = report else {
        panic!("expected a failed single turn");
    };
    assert_eq!(err.kind(), ErrorKind::ModelRejected);
    assert!(store.records().is_empty());

    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(
        contents(&snapshot.transcript),
        [(Sender::User, "something forbidden".to_owned())]
    );
    assert!(!snapshot.state.is_busy());
}

#[tokio::test]
async fn test_store_failure() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    store.set_fail_appends(true);
    let driver = build_driver(&model, &store);

    driver.on_extraction_result(segments(&["x", "y"]));
    let cycles = unwrap_batch(driver.submit_turn("Read").await);
    for cycle in &cycles {
        assert_eq!(
            cycle.result.as_ref().unwrap_err().kind(),
            ErrorKind::StoreAppendFailed
        );
    }
    // The second cycle still ran after the first one failed.
    assert_eq!(model.prompts(), ["Read\nx", "Read\ny"]);
    assert!(store.records().is_empty());
    assert!(!driver.is_busy().await);

    store.set_fail_appends(false);
    let report = driver.submit_turn("Again").await;
    assert_eq!(report, TurnReport::SingleTurn(Ok(())));
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn test_busy_rejection() {
    let mut model = TestModelProvider::default();
    model.set_delay(Duration::from_millis(50));
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    let first = tokio::spawn({
        let driver = driver.clone();
        async move { driver.submit_turn("first").await }
    });
    wait_until_busy(&driver).await;

    let report = driver.submit_turn("second").await;
    assert_eq!(report, TurnReport::Rejected(RejectReason::Busy));

    assert_eq!(first.await.unwrap(), TurnReport::SingleTurn(Ok(())));
    assert_eq!(model.prompts(), ["first"]);
    assert_eq!(store.records().len(), 1);

    // The rejected input never reached the mirror.
    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(snapshot.transcript.len(), 2);
}

#[tokio::test]
async fn test_empty_input_rejected() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    for input in ["", "   ", "\n\t"] {
        let report = driver.submit_turn(input).await;
        assert_eq!(report, TurnReport::Rejected(RejectReason::EmptyInput));
    }
    assert!(model.prompts().is_empty());
    assert!(driver.snapshot().await.unwrap().transcript.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout() {
    let mut model = TestModelProvider::default();
    model.set_delay(Duration::from_secs(120));
    let store = MemoryLogStore::new();
    let driver = DriverBuilder::new(model.clone(), Arc::new(store.clone()))
        .with_model_timeout(Some(Duration::from_secs(1)))
        .build();

    let report = driver.submit_turn("Hello?").await;
    let TurnReport::SingleTurn(Err(err)) = report else {
        panic!("expected a failed single turn");
    };
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
    assert!(err.reason().contains("timed out"));
    assert!(!driver.is_busy().await);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_extraction_mid_batch() {
    let mut model = TestModelProvider::default();
    model.set_delay(Duration::from_millis(20));
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    driver.on_extraction_result(segments(&["a", "b"]));
    let first = tokio::spawn({
        let driver = driver.clone();
        async move { driver.submit_turn("q").await }
    });
    wait_until_busy(&driver).await;
    driver.on_extraction_result(segments(&["c"]));

    let cycles = unwrap_batch(first.await.unwrap());
    assert_eq!(cycles.len(), 2);

    let snapshot = driver.snapshot().await.unwrap();
    assert!(!snapshot.state.segments_consumed());
    assert_eq!(snapshot.state.pending_segments(), segments(&["c"]));

    let cycles = unwrap_batch(driver.submit_turn("q").await);
    assert_eq!(cycles.len(), 1);
    assert_eq!(model.prompts(), ["q\na", "q\nb", "q\nc"]);
    assert!(driver.snapshot().await.unwrap().state.segments_consumed());
}

#[tokio::test]
async fn test_mirror_matches_store() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let mirrored = Arc::new(Mutex::new(vec![]));
    let idle_count = Arc::new(AtomicUsize::new(0));
    let driver = DriverBuilder::new(model.clone(), Arc::new(store.clone()))
        .on_mirror({
            let mirrored = Arc::clone(&mirrored);
            move |msg| mirrored.lock().unwrap().push(msg.clone())
        })
        .on_idle({
            let idle_count = Arc::clone(&idle_count);
            move || {
                idle_count.fetch_add(1, Ordering::Relaxed);
            }
        })
        .build();

    driver.on_extraction_result(segments(&["first page", "second page"]));
    let report = driver.submit_turn("Summarize").await;
    assert!(report.is_success());

    let snapshot = driver.snapshot().await.unwrap();
    assert_eq!(snapshot.transcript.len(), 5);
    let records = store.records();
    assert_eq!(records.len(), 4);
    for (mirrored, record) in snapshot.transcript.messages()[1..].iter().zip(&records) {
        let record = NewMessage {
            text: record.text.clone(),
            sender: record.sender,
        };
        assert!(mirrored.same_content(&record));
    }
    assert_eq!(*mirrored.lock().unwrap(), snapshot.transcript.messages());
    assert_eq!(idle_count.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_shutdown() {
    let model = TestModelProvider::default();
    let store = MemoryLogStore::new();
    let driver = build_driver(&model, &store);

    driver.shutdown();
    while driver.snapshot().await.is_some() {
        tokio::task::yield_now().await;
    }

    let report = driver.submit_turn("Hi").await;
    assert_eq!(report, TurnReport::Rejected(RejectReason::Stopped));
    assert!(!driver.is_busy().await);
    assert!(model.prompts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_turn() {
    let mut model = TestModelProvider::default();
    model.set_delay(Duration::from_secs(5));
    let store = MemoryLogStore::new();
    let driver = DriverBuilder::new(model.clone(), Arc::new(store.clone()))
        .with_model_timeout(None)
        .build();

    let first = tokio::spawn({
        let driver = driver.clone();
        async move { driver.submit_turn("Hi").await }
    });
    wait_until_busy(&driver).await;
    driver.shutdown();

    assert_eq!(first.await.unwrap(), TurnReport::Aborted);
    assert!(store.records().is_empty());
}
