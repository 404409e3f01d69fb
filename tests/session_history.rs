mod support;

use std::time::{Duration, Instant};

use container_inspect::{
    shared_memory_uri, DetectionRequest, DetectionSession, HistoryStore, InMemoryStore,
    SourceKind, SqliteStore, Thresholds, WorkerEvent,
};

use support::{damage_engine, harness, SourceScript, SCRIPTED_MODEL};

const DEADLINE: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(50);

fn request(source: SourceKind) -> DetectionRequest {
    DetectionRequest::new(SCRIPTED_MODEL, source, Thresholds::default()).expect("request")
}

/// Pump events until the session has no active run.
fn drain<S: HistoryStore>(session: &mut DetectionSession<S>) -> Vec<WorkerEvent> {
    let started = Instant::now();
    let mut events = Vec::new();
    while session.is_running() {
        assert!(started.elapsed() < DEADLINE, "run did not end in time");
        if let Some(event) = session.next_event(POLL).expect("next event") {
            events.push(event);
        }
    }
    events
}

#[test]
fn finished_image_run_updates_its_record() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut session = DetectionSession::new(h.worker, InMemoryStore::new());

    let id = session
        .start(request(SourceKind::image("yard/box_17.jpg")))
        .expect("start");
    assert_eq!(session.active_record(), Some(id));
    let records = session.store().list_records().expect("list");
    let placeholder = &records[0];
    assert_eq!(placeholder.summary, "Using model best.onnx for detection...");
    assert_eq!(placeholder.detection_type, "image");
    assert_eq!(placeholder.source, "yard/box_17.jpg");

    let events = drain(&mut session);
    let summary = match events.last() {
        Some(WorkerEvent::RunFinished { summary }) => summary.clone(),
        _ => panic!("image run did not finish"),
    };
    let records = session.store().list_records().expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary, summary);
    assert!(records[0].summary.contains("| box_17 | 2-rusty |"));
}

#[test]
fn stop_after_the_run_ended_still_records_its_summary() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut session = DetectionSession::new(h.worker, InMemoryStore::new());
    session
        .start(request(SourceKind::image("yard/box_17.jpg")))
        .expect("start");

    let started = Instant::now();
    while !session.worker_exited() {
        assert!(started.elapsed() < DEADLINE, "worker did not exit in time");
        std::thread::sleep(Duration::from_millis(5));
    }
    session.stop().expect("stop");

    assert!(!session.is_running());
    let records = session.store().list_records().expect("list");
    assert!(records[0].summary.contains("| box_17 | 2-rusty |"));
    assert_ne!(records[0].summary, "Using model best.onnx for detection...");
}

#[test]
fn failed_run_records_the_error() {
    let script = SourceScript {
        fail_open: true,
        ..SourceScript::default()
    };
    let h = harness(damage_engine(), script, Duration::ZERO);
    let mut session = DetectionSession::new(h.worker, InMemoryStore::new());

    session
        .start(request(SourceKind::video("missing.mp4")))
        .expect("start");
    drain(&mut session);

    let records = session.store().list_records().expect("list");
    assert!(records[0].summary.starts_with("failed to open missing.mp4"));
}

#[test]
fn starting_a_new_run_stops_the_previous_one() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let probe = h.probe.clone();
    let uri = shared_memory_uri();
    let mut session = DetectionSession::new(h.worker, SqliteStore::open(&uri).expect("db"));

    let camera_id = session.start(request(SourceKind::camera("0"))).expect("start");
    let first = session.next_event(Duration::from_secs(10)).expect("event");
    assert!(first.is_some());

    let image_id = session
        .start(request(SourceKind::image("door.png")))
        .expect("restart");
    assert_ne!(camera_id, image_id);
    // The camera run was joined before the image run opened its source.
    assert!(probe.released());
    drain(&mut session);

    let records = session.store().list_records().expect("list");
    assert_eq!(records.len(), 2);
    let camera = records
        .iter()
        .find(|record| record.id == camera_id)
        .expect("camera record");
    assert_eq!(camera.detection_type, "camera");
    // Camera runs never finish, so the placeholder stays.
    assert_eq!(camera.summary, "Using model best.onnx for detection...");
    let image = records
        .iter()
        .find(|record| record.id == image_id)
        .expect("image record");
    assert!(image.summary.contains("door"));
}

#[test]
fn stop_without_a_run_is_a_no_op() {
    let h = harness(damage_engine(), SourceScript::default(), Duration::ZERO);
    let mut session = DetectionSession::new(h.worker, InMemoryStore::new());
    assert!(!session.is_running());
    session.stop().expect("stop");
    assert!(session.next_event(POLL).expect("poll").is_none());
}
