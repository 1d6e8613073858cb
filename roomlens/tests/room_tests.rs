//! Room lifecycle tests: joining, event reconciliation, stats sampling and
//! teardown through the public API

use async_trait::async_trait;
use parking_lot::Mutex;
use roomlens::{
    ConnectionState, ParticipantChange, ParticipantEvent, ParticipantSnapshot, PresentationObserver, RoomConfig,
    RoomEvent, RoomLens, RoomLensError, RoomRecord, RoomSnapshot, RoomSupervisor, StatsReport, StatsSource,
    TrackChange, TrackEvent, TrackId, TrackKind, TrackSnapshot, TrackStatSample,
};
use roomlens::GlobalConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<String>>,
}

impl Recorder {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn participant_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with("participant "))
            .collect()
    }
}

impl PresentationObserver for Recorder {
    fn on_track_changed(&self, room_sid: &str, id: &TrackId, change: &TrackChange<'_>) {
        self.lines
            .lock()
            .push(format!("track {} {} {}", room_sid, id.as_str(), change.kind()));
    }

    fn on_participant_changed(&self, _room_sid: &str, change: &ParticipantChange<'_>) {
        let kind = match change {
            ParticipantChange::Connected(_) => "connected",
            ParticipantChange::Updated(_) => "updated",
            ParticipantChange::Disconnected(_) => "disconnected",
        };
        let record = change.record();
        self.lines
            .lock()
            .push(format!("participant {} {} {}", record.sid, kind, record.connection_state));
    }

    fn on_room_changed(&self, room: &RoomRecord) {
        self.lines.lock().push(format!("room {} {}", room.sid, room.state));
    }
}

/// Reports `n * 1000` local and `n * 4000` remote bytes on the n-th fetch,
/// `n` seconds after the epoch
#[derive(Default)]
struct ScriptedSource {
    calls: AtomicU64,
    fail_on: Option<u64>,
}

impl ScriptedSource {
    fn failing_on(call: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_on: Some(call),
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn report(n: u64) -> StatsReport {
    StatsReport {
        peer_connection_id: "PC1".to_string(),
        local_audio_track_stats: vec![TrackStatSample {
            track_sid: Some("MTa".to_string()),
            track_id: Some("mic".to_string()),
            bytes: n * 1000,
            timestamp: n * 1000,
        }],
        remote_video_track_stats: vec![TrackStatSample {
            track_sid: Some("MTv".to_string()),
            track_id: None,
            bytes: n * 4000,
            timestamp: n * 1000,
        }],
        ..Default::default()
    }
}

#[async_trait]
impl StatsSource for ScriptedSource {
    async fn get_stats(&self) -> Result<Vec<StatsReport>, RoomLensError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(RoomLensError::StatsFetch {
                room_sid: "RM1".to_string(),
                reason: "peer connection closed".to_string(),
            });
        }
        Ok(vec![report(n)])
    }
}

fn snapshot() -> RoomSnapshot {
    RoomSnapshot::new("RM1", "alice")
        .with_local_track(TrackSnapshot::new("MTa", TrackKind::Audio).started("mic"))
        .with_participant(
            ParticipantSnapshot::new("bob", "PA1")
                .with_track(TrackSnapshot::new("MTv", TrackKind::Video).with_name("camera").started("cam")),
        )
}

fn rate(view: &roomlens::RoomView, id: &str) -> f64 {
    view.tracks
        .iter()
        .find(|record| record.id().as_str() == id)
        .map(|record| record.byte_rate())
        .unwrap_or(f64::NAN)
}

#[tokio::test(start_paused = true)]
async fn test_join_samples_rates() {
    let lens = RoomLens::init().unwrap();
    let source = Arc::new(ScriptedSource::default());
    let room = lens.room(snapshot()).stats_source(source.clone()).join().await.unwrap();

    let view = room.view().await.unwrap();
    assert_eq!(view.track_count(), 2);
    assert_eq!(view.participant_count(), 1);
    assert!(view.sampler_active);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let view = room.view().await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(rate(&view, "MTa"), 1.0);
    assert_eq!(rate(&view, "MTv"), 4.0);

    let details = room.track_details(&TrackId::new("MTv")).unwrap();
    assert!(details
        .iter()
        .any(|stat| stat.label == "received kbps" && stat.value == "4"));

    assert!(room.leave().await.unwrap());
    lens.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_is_retried() {
    let lens = RoomLens::init().unwrap();
    let source = Arc::new(ScriptedSource::failing_on(1));
    let room = lens.room(snapshot()).stats_source(source.clone()).join().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let view = room.view().await.unwrap();
    assert_eq!(source.calls(), 1);
    assert!(view.sampler_active);
    assert_eq!(rate(&view, "MTa"), 0.0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let view = room.view().await.unwrap();
    assert_eq!(source.calls(), 3);
    assert_eq!(rate(&view, "MTa"), 1.0);
    assert_eq!(rate(&view, "MTv"), 4.0);
}

#[tokio::test(start_paused = true)]
async fn test_stats_interval_override() {
    let lens = RoomLens::init_with(GlobalConfig {
        stats_interval: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap();
    let source = Arc::new(ScriptedSource::default());
    let _room = lens
        .room(snapshot())
        .stats_source(source.clone())
        .stats_interval(Duration::from_millis(200))
        .join()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(source.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_unpublish_then_disconnect_tears_room_down() {
    let recorder = Arc::new(Recorder::default());
    let lens = RoomLens::init_with_observer(GlobalConfig::default(), recorder.clone()).unwrap();
    let source = Arc::new(ScriptedSource::default());
    let room = lens.room(snapshot()).stats_source(source.clone()).join().await.unwrap();

    room.dispatch(ParticipantEvent::TrackUnpublished {
        participant_sid: "PA1".to_string(),
        track_sid: TrackId::new("MTv"),
    })
    .unwrap();
    let view = room.view().await.unwrap();
    assert_eq!(view.track_count(), 1);
    assert_eq!(view.tracks[0].id().as_str(), "MTa");
    assert_eq!(view.participant_count(), 1);
    assert!(view.record.participant("PA1").unwrap().tracks.is_empty());
    assert!(recorder.lines().contains(&"participant PA1 updated connected".to_string()));

    room.dispatch(RoomEvent::Disconnected { reason: None }).unwrap();
    let err = room.view().await.unwrap_err();
    assert!(matches!(err, RoomLensError::RoomNotFound { .. }));
    assert!(lens.rooms().await.unwrap().is_empty());

    let lines = recorder.lines();
    assert!(lines.contains(&"track RM1 MTv removed".to_string()));
    assert!(lines.contains(&"track RM1 MTa removed".to_string()));
    assert!(lines.contains(&"participant PA1 disconnected disconnected".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("room RM1 disconnected"));

    // sampler is cancelled with the room
    let calls = source.calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), calls);

    // the room was already torn down by the vendor disconnect
    assert!(!room.leave().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_participant_reconnection_is_observed_in_order() {
    let recorder = Arc::new(Recorder::default());
    let lens = RoomLens::init_with_observer(GlobalConfig::default(), recorder.clone()).unwrap();
    let room = lens
        .room(RoomSnapshot::new("RM1", "alice"))
        .without_stats()
        .join()
        .await
        .unwrap();

    room.dispatch(RoomEvent::ParticipantConnected {
        participant: ParticipantSnapshot::new("carol", "PA2"),
    })
    .unwrap();
    room.dispatch(ParticipantEvent::Reconnecting {
        participant_sid: "PA2".to_string(),
    })
    .unwrap();
    room.dispatch(ParticipantEvent::Reconnected {
        participant_sid: "PA2".to_string(),
    })
    .unwrap();

    let view = room.view().await.unwrap();
    assert_eq!(
        view.record.participant("PA2").map(|p| p.connection_state),
        Some(ConnectionState::Connected)
    );
    assert_eq!(
        recorder.participant_lines(),
        vec![
            "participant PA2 connected connected",
            "participant PA2 updated reconnecting",
            "participant PA2 updated connected",
        ]
    );
    assert!(lens
        .activity_log()
        .messages()
        .iter()
        .any(|line| line.contains("reconnecting")));

    let details = room.room_details().unwrap();
    let carol = details.iter().find(|stat| stat.label == "PA2").unwrap();
    assert_eq!(carol.value, "connected");
    assert_eq!(carol.highlight, None);
    assert!(details.iter().any(|stat| stat.label == "room.state" && stat.value == "connected"));
    assert!(!room.attach(&TrackId::new("MTmissing")));
    assert!(room.track_details(&TrackId::new("MTmissing")).is_none());
}

#[tokio::test]
async fn test_json_events_are_reconciled() {
    let lens = RoomLens::init().unwrap();
    let room = lens.room(snapshot()).without_stats().join().await.unwrap();

    room.dispatch_json(r#"{"entity":"track","type":"muted","trackSid":"MTa"}"#)
        .unwrap();
    room.dispatch_json(r#"{"entity":"track","type":"switchedOff","trackSid":"MTv","reason":"bandwidth"}"#)
        .unwrap();
    room.dispatch_json(r#"{"entity":"room","type":"recordingStarted"}"#).unwrap();
    room.dispatch_json("{ not json").unwrap();
    room.dispatch_json(r#"{"entity":"participant","type":"reconnecting","participantSid":"PA9"}"#)
        .unwrap();

    let view = room.view().await.unwrap();
    let local = view.tracks.iter().find(|t| t.id().as_str() == "MTa").unwrap();
    let remote = view.tracks.iter().find(|t| t.id().as_str() == "MTv").unwrap();
    assert!(local.is_muted());
    assert_eq!(
        remote.switch_off().and_then(|state| state.reason.as_deref()),
        Some("bandwidth")
    );
    assert!(view.record.is_recording);
    assert!(lens.activity_log().messages().contains(&"recordingStarted".to_string()));
}

#[tokio::test]
async fn test_track_events_update_records() {
    let lens = RoomLens::init().unwrap();
    let room = lens.room(snapshot()).without_stats().join().await.unwrap();

    room.dispatch(TrackEvent::Disabled {
        track_sid: TrackId::new("MTv"),
    })
    .unwrap();
    room.dispatch(TrackEvent::Stopped {
        track_sid: TrackId::new("MTa"),
    })
    .unwrap();
    // unknown tracks are dropped without affecting the room
    room.dispatch(TrackEvent::Muted {
        track_sid: TrackId::new("MTzz"),
    })
    .unwrap();

    let view = room.view().await.unwrap();
    let local = view.tracks.iter().find(|t| t.id().as_str() == "MTa").unwrap();
    let remote = view.tracks.iter().find(|t| t.id().as_str() == "MTv").unwrap();
    assert!(!local.accepts_samples());
    assert!(!remote.is_enabled());
    assert_eq!(view.track_count(), 2);
}

/// Takes three seconds to answer each fetch
#[derive(Default)]
struct SlowSource {
    started: AtomicU64,
    finished: AtomicU64,
}

#[async_trait]
impl StatsSource for SlowSource {
    async fn get_stats(&self) -> Result<Vec<StatsReport>, RoomLensError> {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(vec![report(n)])
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_in_flight_during_leave_is_dropped() {
    let recorder = Arc::new(Recorder::default());
    let lens = RoomLens::init_with_observer(GlobalConfig::default(), recorder.clone()).unwrap();
    let source = Arc::new(SlowSource::default());
    let room = lens.room(snapshot()).stats_source(source.clone()).join().await.unwrap();

    // first tick at 1s, its fetch answers at 4s
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.started.load(Ordering::SeqCst), 1);
    assert_eq!(source.finished.load(Ordering::SeqCst), 0);

    assert!(room.leave().await.unwrap());
    let observed = recorder.lines();
    assert_eq!(observed.last().map(String::as_str), Some("room RM1 disconnected"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.lines(), observed);
    assert_eq!(source.started.load(Ordering::SeqCst), 1);
    assert!(lens.rooms().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_late_stats_after_leave_are_dropped() {
    let recorder = Arc::new(Recorder::default());
    let (mut supervisor, _commands) = RoomSupervisor::new(recorder.clone(), Duration::from_secs(1));
    let config = RoomConfig::default();

    let first = supervisor.join(&snapshot(), &config, None).unwrap();
    assert!(supervisor.leave("RM1"));
    let observed = recorder.lines().len();

    assert_eq!(supervisor.apply_stats("RM1", first.generation, &[report(1)]), 0);
    assert_eq!(recorder.lines().len(), observed);

    // a report of the previous session is stale after rejoining
    let second = supervisor.join(&snapshot(), &config, None).unwrap();
    assert_ne!(second.generation, first.generation);
    let observed = recorder.lines().len();
    assert_eq!(supervisor.apply_stats("RM1", first.generation, &[report(1)]), 0);
    assert_eq!(recorder.lines().len(), observed);

    assert_eq!(supervisor.apply_stats("RM1", second.generation, &[report(1)]), 2);
    assert_eq!(recorder.lines().len(), observed + 2);
}

#[tokio::test]
async fn test_duplicate_join_keeps_first_session() {
    let lens = RoomLens::init().unwrap();
    let room = lens.room(snapshot()).without_stats().join().await.unwrap();

    let err = lens.room(snapshot()).without_stats().join().await.unwrap_err();
    assert!(matches!(err, RoomLensError::RoomAlreadyJoined { .. }));
    assert_eq!(room.view().await.unwrap().track_count(), 2);
}
