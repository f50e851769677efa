#![allow(dead_code)] // Not every test binary uses every helper

use hbctl::engine::{AudioEncoder, AudioTrack, EncodeConfig, Mixdown, SampleRate, VideoCodec};
use std::path::PathBuf;
use tempfile::TempDir;

/// x264 MP4 encode with one default audio track
pub fn sample_config() -> EncodeConfig {
    let mut config = EncodeConfig {
        source: "/media/in.mkv".to_string(),
        destination: "/media/out.mp4".to_string(),
        video_codec: Some(VideoCodec::H264),
        ..Default::default()
    };
    config.set_bitrate(1500);
    config.enable_audio_track(0, AudioTrack::default());
    config
}

pub fn audio_track(encoder: AudioEncoder, bitrate_kbps: u32) -> AudioTrack {
    AudioTrack {
        encoder,
        bitrate_kbps,
        sample_rate: SampleRate::Khz48,
        mixdown: Mixdown::Automatic,
        drc: 0.0,
    }
}

/// Temporary directory with a path for a preset file inside it
pub fn temp_presets() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("presets.dat");
    (dir, path)
}
