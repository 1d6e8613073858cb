//! Aggregate statistics reports and byte-rate computation

use crate::track::TrackOrigin;
use serde::{de, Deserialize, Deserializer, Serialize};

/// A byte counter observed at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSample {
    /// Bytes sent (local) or received (remote) so far
    pub bytes: u64,
    /// Sample timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl ByteSample {
    /// Create a new sample
    pub fn new(bytes: u64, timestamp_ms: u64) -> Self {
        Self {
            bytes,
            timestamp_ms,
        }
    }
}

/// Round to one decimal place
pub fn round_to_tenth(value: f64) -> f64 {
    ((value + f64::EPSILON) * 10.0).round() / 10.0
}

/// Transfer rate in bytes per millisecond between two samples.
///
/// The first sample of a track has no delta and yields 0. The elapsed time is
/// clamped to at least 1 ms. A counter that went backwards (the vendor reset it
/// after renegotiation) also yields 0 so the next sample measures from the new
/// baseline.
pub fn compute_byte_rate(previous: Option<ByteSample>, current: ByteSample) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    if current.bytes < previous.bytes {
        return 0.0;
    }
    let elapsed_ms = current.timestamp_ms.saturating_sub(previous.timestamp_ms).max(1);
    round_to_tenth((current.bytes - previous.bytes) as f64 / elapsed_ms as f64)
}

/// Counters of one track inside a [`StatsReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatSample {
    /// Vendor track SID, when the track is published
    #[serde(default)]
    pub track_sid: Option<String>,
    /// Media-track id the counters were read from
    #[serde(default)]
    pub track_id: Option<String>,
    /// Bytes sent (local tracks) or received (remote tracks); a missing
    /// counter counts as 0
    #[serde(default, alias = "bytesSent", alias = "bytesReceived")]
    pub bytes: u64,
    /// Sample timestamp in milliseconds, rounded from the fractional value
    /// the vendor reports
    #[serde(deserialize_with = "deserialize_millis")]
    pub timestamp: u64,
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = f64::deserialize(deserializer)?;
    if !millis.is_finite() || millis < 0.0 {
        return Err(de::Error::custom(format!("invalid timestamp {}", millis)));
    }
    Ok(millis.round() as u64)
}

impl TrackStatSample {
    /// Byte sample carried by this entry
    pub fn byte_sample(&self) -> ByteSample {
        ByteSample::new(self.bytes, self.timestamp)
    }
}

/// Aggregate statistics for one peer connection, grouped the way the vendor
/// SDK reports them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Peer connection the report was taken from
    #[serde(default)]
    pub peer_connection_id: String,
    /// Local audio tracks
    #[serde(default)]
    pub local_audio_track_stats: Vec<TrackStatSample>,
    /// Local video tracks
    #[serde(default)]
    pub local_video_track_stats: Vec<TrackStatSample>,
    /// Remote audio tracks
    #[serde(default)]
    pub remote_audio_track_stats: Vec<TrackStatSample>,
    /// Remote video tracks
    #[serde(default)]
    pub remote_video_track_stats: Vec<TrackStatSample>,
}

impl StatsReport {
    /// Iterate every sample in the report together with its origin
    pub fn samples(&self) -> impl Iterator<Item = (TrackOrigin, &TrackStatSample)> {
        let local = self
            .local_audio_track_stats
            .iter()
            .chain(self.local_video_track_stats.iter())
            .map(|sample| (TrackOrigin::Local, sample));
        let remote = self
            .remote_audio_track_stats
            .iter()
            .chain(self.remote_video_track_stats.iter())
            .map(|sample| (TrackOrigin::Remote, sample));
        local.chain(remote)
    }

    /// Number of track samples in the report
    pub fn len(&self) -> usize {
        self.local_audio_track_stats.len()
            + self.local_video_track_stats.len()
            + self.remote_audio_track_stats.len()
            + self.remote_video_track_stats.len()
    }

    /// Check if the report carries no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_between_samples() {
        let rate = compute_byte_rate(Some(ByteSample::new(1000, 0)), ByteSample::new(1500, 1000));
        assert_eq!(rate, 0.5);
    }

    #[test]
    fn test_first_sample_has_zero_rate() {
        assert_eq!(compute_byte_rate(None, ByteSample::new(1000, 0)), 0.0);
    }

    #[test]
    fn test_rate_clamps_elapsed_time() {
        // same timestamp: divide by 1ms
        let rate = compute_byte_rate(Some(ByteSample::new(100, 500)), ByteSample::new(350, 500));
        assert_eq!(rate, 250.0);
        // clock went backwards
        let rate = compute_byte_rate(Some(ByteSample::new(100, 500)), ByteSample::new(110, 400));
        assert_eq!(rate, 10.0);
    }

    #[test]
    fn test_counter_reset_yields_zero() {
        let rate = compute_byte_rate(Some(ByteSample::new(9000, 0)), ByteSample::new(10, 1000));
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(0.44), 0.4);
        assert_eq!(round_to_tenth(0.45), 0.5);
        assert_eq!(round_to_tenth(12.96), 13.0);
        assert_eq!(round_to_tenth(1.0 / 3.0), 0.3);
    }

    #[test]
    fn test_report_deserializes_vendor_json() {
        let json = r#"{
            "peerConnectionId": "PC1",
            "localAudioTrackStats": [
                { "trackId": "ms-audio", "trackSid": "MTa", "bytesSent": 2048, "timestamp": 1000 }
            ],
            "remoteVideoTrackStats": [
                { "trackId": "ms-video", "trackSid": "MTv", "timestamp": 1000 }
            ]
        }"#;
        let report: StatsReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.len(), 2);

        let samples: Vec<_> = report.samples().collect();
        assert_eq!(samples[0].0, TrackOrigin::Local);
        assert_eq!(samples[0].1.bytes, 2048);
        assert_eq!(samples[1].0, TrackOrigin::Remote);
        // missing bytesReceived counts as 0
        assert_eq!(samples[1].1.bytes, 0);
        assert_eq!(samples[1].1.track_sid.as_deref(), Some("MTv"));
    }

    #[test]
    fn test_fractional_timestamps_are_rounded() {
        let json = r#"{
            "localAudioTrackStats": [
                { "trackSid": "MTa", "bytesSent": 2048, "timestamp": 1700000000123.456 }
            ],
            "remoteAudioTrackStats": [
                { "trackSid": "MTb", "bytesReceived": 512, "timestamp": 1700000000123.5 }
            ]
        }"#;
        let report: StatsReport = serde_json::from_str(json).unwrap();
        let samples: Vec<_> = report.samples().collect();
        assert_eq!(samples[0].1.byte_sample(), ByteSample::new(2048, 1_700_000_000_123));
        assert_eq!(samples[1].1.timestamp, 1_700_000_000_124);

        let negative = r#"{ "localAudioTrackStats": [ { "bytesSent": 1, "timestamp": -5.0 } ] }"#;
        assert!(serde_json::from_str::<StatsReport>(negative).is_err());
    }
}
