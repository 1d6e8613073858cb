//! Room monitor demo
//!
//! Joins a simulated room, feeds it vendor events and synthetic statistics,
//! and prints the rendered track details and the activity log.

use anyhow::Result;
use async_trait::async_trait;
use roomlens::{
    GlobalConfig, ParticipantEvent, ParticipantSnapshot, RoomEvent, RoomLens, RoomLensError, RoomSnapshot,
    StatsReport, StatsSource, TrackEvent, TrackId, TrackKind, TrackSnapshot, TrackStatSample,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stats of a steady 48 kB/s microphone and a 250 kB/s remote camera
struct SimulatedStats {
    started: tokio::time::Instant,
    ticks: AtomicU64,
}

#[async_trait]
impl StatsSource for SimulatedStats {
    async fn get_stats(&self) -> Result<Vec<StatsReport>, RoomLensError> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        Ok(vec![StatsReport {
            peer_connection_id: "PC-demo".to_string(),
            local_audio_track_stats: vec![TrackStatSample {
                track_sid: Some("MTmic".to_string()),
                track_id: Some("mic-media".to_string()),
                bytes: elapsed_ms * 48,
                timestamp: elapsed_ms,
            }],
            remote_video_track_stats: vec![TrackStatSample {
                track_sid: Some("MTcam".to_string()),
                track_id: None,
                bytes: elapsed_ms * 250,
                timestamp: elapsed_ms,
            }],
            ..Default::default()
        }])
    }
}

fn print_details(room: &roomlens::RoomSession, sid: &str) {
    println!("   📊 {}", sid);
    for stat in room.track_details(&TrackId::new(sid)).unwrap_or_default() {
        let marker = match stat.highlight {
            Some(_) => "⚠️ ",
            None => "",
        };
        println!("      {}{} = {}", marker, stat.label, stat.value);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GlobalConfig {
        log_filter: "info,roomlens=debug".to_string(),
        ..Default::default()
    };
    config.logger().init()?;

    println!("🔄 Starting RoomLens");
    let lens = RoomLens::init_with(config)?;

    let snapshot = RoomSnapshot::new("RMdemo", "alice")
        .with_local_track(
            TrackSnapshot::new("MTmic", TrackKind::Audio)
                .with_name("microphone")
                .started("mic-media"),
        )
        .with_participant(ParticipantSnapshot::new("bob", "PAbob").with_track(
            TrackSnapshot::new("MTcam", TrackKind::Video)
                .with_name("camera")
                .started("cam-media"),
        ));

    let stats = Arc::new(SimulatedStats {
        started: tokio::time::Instant::now(),
        ticks: AtomicU64::new(0),
    });
    let room = lens
        .room(snapshot)
        .stats_source(stats.clone())
        .stats_interval(Duration::from_millis(500))
        .join()
        .await?;
    println!("✅ Joined {} as {}", room.sid(), room.local_identity());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    room.dispatch(TrackEvent::Muted {
        track_sid: TrackId::new("MTmic"),
    })?;
    room.dispatch(ParticipantEvent::Reconnecting {
        participant_sid: "PAbob".to_string(),
    })?;
    room.dispatch(RoomEvent::RecordingStarted)?;
    room.dispatch_json(r#"{"entity":"participant","type":"reconnected","participantSid":"PAbob"}"#)?;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let view = room.view().await?;
    println!(
        "🔄 {} tracks, {} participants after {} samples",
        view.track_count(),
        view.participant_count(),
        stats.ticks.load(Ordering::Relaxed)
    );
    println!("   🏠 {}", room.sid());
    for stat in room.room_details().unwrap_or_default() {
        println!("      {} = {}", stat.label, stat.value);
    }
    print_details(&room, "MTmic");
    print_details(&room, "MTcam");

    room.dispatch(RoomEvent::Disconnected {
        reason: Some("demo finished".to_string()),
    })?;
    // wait for the supervisor to process the disconnect
    let _ = lens.rooms().await?;

    println!("📝 Activity log:");
    for entry in lens.activity_log().entries() {
        println!("   {} {}", entry.at.format("%H:%M:%S%.3f"), entry.message);
    }

    lens.shutdown().await?;
    Ok(())
}
