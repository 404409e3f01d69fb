mod support;

use std::time::Duration;

use container_inspect::{
    DetectionRequest, ResultTable, RunError, SourceKind, Thresholds, WorkerEvent, WorkerHandle,
    NO_DETECTIONS_MESSAGE,
};

use support::{bbox, damage_engine, harness, ScriptedEngineSpec, SourceScript, SCRIPTED_MODEL};

const WAIT: Duration = Duration::from_secs(10);

fn request(model: &str, source: SourceKind) -> DetectionRequest {
    DetectionRequest::new(model, source, Thresholds::default()).expect("request")
}

/// Every event until the worker exits.
fn collect(handle: &WorkerHandle) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = handle.recv_timeout(WAIT) {
        events.push(event);
    }
    events
}

fn kinds(events: &[WorkerEvent]) -> Vec<&'static str> {
    events.iter().map(WorkerEvent::kind_name).collect()
}

fn table_of(event: &WorkerEvent) -> &ResultTable {
    match event {
        WorkerEvent::ResultReady(table) => table,
        other => panic!("expected a result event, got {}", other.kind_name()),
    }
}

#[test]
fn image_run_emits_frame_result_and_finish_in_order() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::image("yard/box_17.jpg")))
        .expect("spawn");
    let events = collect(&handle);
    handle.stop().expect("stop");

    assert_eq!(kinds(&events), vec!["frame", "result", "finished"]);
    let table = table_of(&events[1]);
    let class_ids: Vec<&str> = table.rows().iter().map(|r| r.class_id.as_str()).collect();
    assert_eq!(class_ids, vec!["2-rusty", "4-sd", "3-scratch", "1-broken"]);
    assert!(table.rows().iter().all(|r| r.image_id == "box_17"));
    assert!(table
        .to_string()
        .contains("| box_17 | 2-rusty | 0.5000 | 0.2500 | 0.5000 | 0.2500 |"));

    match &events[2] {
        WorkerEvent::RunFinished { summary } => assert_eq!(summary, &table.to_string()),
        other => panic!("unexpected {}", other.kind_name()),
    }
    match &events[0] {
        WorkerEvent::FrameReady(frame) => assert_eq!(frame.shape(), (16, 16)),
        other => panic!("unexpected {}", other.kind_name()),
    }
    assert_eq!(h.engine.infer_calls(), 1);
}

#[test]
fn stop_during_image_run_still_delivers_every_event() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::image("yard/box_17.jpg")))
        .expect("spawn");
    let drained = handle.stop().expect("stop");

    assert_eq!(kinds(&drained), vec!["frame", "result", "finished"]);
    assert_eq!(h.engine.infer_calls(), 1);
}

#[test]
fn inference_failure_fails_the_run_without_frame_events() {
    let script = SourceScript {
        frames: Some(3),
        ..SourceScript::default()
    };
    let h = harness(damage_engine().failing(), script, Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("clip.mp4")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["failed"]);
    assert!(matches!(
        &events[0],
        WorkerEvent::RunFailed(RunError::Inference { reason }) if reason.contains("tensor shape")
    ));
    assert!(h.probe.released());
    assert_eq!(h.engine.infer_calls(), 1);
}

#[test]
fn engine_load_failure_is_the_only_event() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let handle = h
        .worker
        .spawn(request("weights/best.pt", SourceKind::image("a.jpg")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["failed"]);
    assert!(matches!(
        &events[0],
        WorkerEvent::RunFailed(RunError::EngineLoad { model, .. }) if model == "weights/best.pt"
    ));
    assert_eq!(h.probe.opened(), 0);
    assert_eq!(h.engine.infer_calls(), 0);
}

#[test]
fn video_run_finishes_with_completion_summary() {
    let script = SourceScript {
        frames: Some(3),
        ..SourceScript::default()
    };
    let h = harness(damage_engine(), script, Duration::from_millis(1));
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("clip.mp4")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(
        kinds(&events),
        vec!["frame", "result", "frame", "result", "frame", "result", "finished"]
    );
    let last_table = table_of(&events[5]).to_string();
    assert!(last_table.contains("| video_frame | 2-rusty |"));
    match events.last() {
        Some(WorkerEvent::RunFinished { summary }) => {
            assert_eq!(summary, &format!("Video processing completed.\n{}", last_table));
        }
        _ => panic!("video run did not finish"),
    }
    assert!(h.probe.released());
    assert_eq!(h.engine.infer_calls(), 3);
}

#[test]
fn empty_video_finishes_with_in_progress_placeholder() {
    let script = SourceScript {
        frames: Some(0),
        ..SourceScript::default()
    };
    let h = harness(damage_engine(), script, Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("empty.mp4")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["finished"]);
    match &events[0] {
        WorkerEvent::RunFinished { summary } => assert_eq!(
            summary,
            "Video processing completed.\nVideo processing in progress..."
        ),
        other => panic!("unexpected {}", other.kind_name()),
    }
    assert!(h.probe.released());
}

#[test]
fn cancelled_video_releases_source_without_finishing() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::from_millis(5));
    let mut handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("long.mp4")))
        .expect("spawn");

    let first = handle.recv_timeout(WAIT).expect("first event");
    assert_eq!(first.kind_name(), "frame");
    let drained = handle.stop().expect("stop");

    assert!(handle.is_finished());
    assert!(h.probe.released());
    assert!(drained.iter().all(|event| !event.is_terminal()));
    // No inference starts once the stop is observed.
    let calls = h.engine.infer_calls();
    assert_eq!(calls as u64, h.probe.reads());
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(h.engine.infer_calls(), calls);
    assert!(handle.recv().is_none());
}

#[test]
fn camera_read_failure_fails_the_run_once() {
    let script = SourceScript {
        fail_after: Some(2),
        ..SourceScript::default()
    };
    let h = harness(damage_engine(), script, Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::camera("0")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(
        kinds(&events),
        vec!["frame", "result", "frame", "result", "failed"]
    );
    assert!(table_of(&events[1]).to_string().contains("| camera_frame |"));
    assert!(matches!(
        events.last(),
        Some(WorkerEvent::RunFailed(RunError::FrameRead { locator, .. })) if locator == "0"
    ));
    assert!(h.probe.released());
}

#[test]
fn stopped_camera_emits_no_terminal_event() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::camera("/dev/video2")))
        .expect("spawn");
    for _ in 0..4 {
        handle.recv_timeout(WAIT).expect("camera event");
    }
    let drained = handle.stop().expect("stop");
    assert!(drained.iter().all(|event| !event.is_terminal()));
    assert!(h.probe.released());
}

#[test]
fn dropping_the_handle_stops_the_run() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::camera("1")))
        .expect("spawn");
    handle.recv_timeout(WAIT).expect("camera event");
    drop(handle);
    assert!(h.probe.released());
}

#[test]
fn unmapped_label_fails_before_the_frame_is_emitted() {
    let engine = ScriptedEngineSpec::new(&["hole", "dent"], vec![bbox(0.9, 1)]);
    let script = SourceScript {
        frames: Some(5),
        ..SourceScript::default()
    };
    let h = harness(engine, script, Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("clip.mp4")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["failed"]);
    assert!(matches!(
        &events[0],
        WorkerEvent::RunFailed(RunError::UnmappedClassLabel { label }) if label == "dent"
    ));
    assert!(h.probe.released());
}

#[test]
fn source_open_failure_is_reported() {
    let script = SourceScript {
        fail_open: true,
        ..SourceScript::default()
    };
    let h = harness(damage_engine(), script, Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::video("missing.mp4")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["failed"]);
    assert!(matches!(
        &events[0],
        WorkerEvent::RunFailed(RunError::SourceOpen { locator, .. }) if locator == "missing.mp4"
    ));
    assert_eq!(h.engine.infer_calls(), 0);
}

#[test]
fn frames_without_detections_render_the_sentinel() {
    let engine = ScriptedEngineSpec::new(&["hole"], Vec::new());
    let h = harness(engine, SourceScript::default(), Duration::ZERO);
    let handle = h
        .worker
        .spawn(request(SCRIPTED_MODEL, SourceKind::image("empty.png")))
        .expect("spawn");
    let events = collect(&handle);

    assert_eq!(kinds(&events), vec!["frame", "result", "finished"]);
    assert_eq!(table_of(&events[1]), &ResultTable::NoDetections);
    assert!(matches!(
        &events[2],
        WorkerEvent::RunFinished { summary } if summary == NO_DETECTIONS_MESSAGE
    ));
}
