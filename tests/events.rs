mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use jobmill::events::{ChannelSink, EventBus, JobEvent, MemorySink};
use jobmill::types::{JobId, JobStatus};
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::test]
async fn handle_log_lines_stream_to_sinks_in_order() {
    let h = harness();
    let workflow = ScriptedWorkflow::new(&["fetching page", "parsing listings"], json!(null));
    let id = h.runner.submit("scraper", Arc::new(workflow), json!({}));
    wait_for_terminal(&h.jobs, &id).await;

    // The bus delivers asynchronously; wait until everything arrived.
    let logs = poll_until(|| {
        let logs = h.sink.lines_for(&id);
        (logs.len() == 4).then_some(logs)
    })
    .await;
    assert_eq!(
        logs,
        vec![
            "Starting workflow: scraper",
            "fetching page",
            "parsing listings",
            "Workflow complete"
        ]
    );
}

#[tokio::test]
async fn status_transitions_are_mirrored_onto_the_bus() {
    let h = harness();
    let id = h.runner.submit(
        "quick",
        Arc::new(ScriptedWorkflow::new(&[], json!(null))),
        json!({}),
    );
    wait_for_terminal(&h.jobs, &id).await;

    let statuses = poll_until(|| {
        let statuses: Vec<JobStatus> = h
            .sink
            .snapshot()
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Status { status, .. } => Some(status),
                _ => None,
            })
            .collect();
        (statuses.len() == 2).then_some(statuses)
    })
    .await;
    assert_eq!(statuses, vec![JobStatus::Running, JobStatus::Complete]);
}

#[tokio::test]
async fn stop_listener_flushes_pending_events() {
    let sink = MemorySink::new();
    let snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    bus.get_sender()
        .send(JobEvent::diagnostic("test", "payload"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.stop_listener().await;

    let entries = snapshot.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].to_string(), "[test] payload");
}

#[tokio::test]
async fn stopping_without_events_is_a_noop() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();
    bus.stop_listener().await;
}

#[tokio::test]
async fn per_job_channel_sink_drops_other_jobs_and_diagnostics() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let target = JobId::from("job_aaaaaaaaaaaa");
    let bus = EventBus::with_sink(ChannelSink::for_job(target.clone(), tx));
    bus.listen_for_events();

    let sender = bus.get_sender();
    sender
        .send(JobEvent::log(JobId::from("job_bbbbbbbbbbbb"), "other job"))
        .unwrap();
    sender
        .send(JobEvent::diagnostic("runner", "noise"))
        .unwrap();
    sender.send(JobEvent::log(target, "mine")).unwrap();

    // The bus processes in order, so the first delivery is already past the
    // filtered events.
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event should arrive")
        .expect("channel should stay open");
    assert_eq!(received.to_string(), "[job_aaaaaaaaaaaa] mine");
}

#[tokio::test]
async fn channel_sink_pushes_events_to_async_consumers() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bus = EventBus::with_sink(ChannelSink::new(tx));
    bus.listen_for_events();

    bus.get_sender()
        .send(JobEvent::diagnostic("runner", "up"))
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event should arrive")
        .expect("channel should stay open");
    assert_eq!(received.to_string(), "[runner] up");
}
