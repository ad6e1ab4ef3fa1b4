//! Integration tests for clip loading and prompt playback
//!
//! These load clips the way startup does and play them through the
//! configured output device.

use crate::test_utils::wav;
use carecall::alert::ALERT_BINDINGS;
use carecall::audio::{open_output_device, AudioError, ClipTable, DecodeError, PlaybackOrchestrator, PlaybackOutcome};
use carecall::config::{OutputBackend, Settings};
use std::error::Error;
use std::time::Duration as StdDuration;
use tempfile::tempdir;

#[cfg(test)]
mod playback_integration_tests {
    use super::*;

    #[test]
    fn test_missing_recordings_fall_back_to_chimes() -> Result<(), Box<dyn Error>> {
        let clips = ClipTable::from_settings(&Settings::default())?;
        assert_eq!(clips.len(), 2);

        let mut names: Vec<&str> = clips.names().collect();
        names.sort();
        assert_eq!(names, vec!["restroom", "water"]);

        for name in ["water", "restroom"] {
            let clip = clips.get(name).ok_or("clip missing")?;
            let header = carecall::audio::decode(clip)?;
            assert_eq!(header.bits_per_sample, 16);
            assert_eq!(header.channel_count, 1);
            assert!(header.duration_ms() > 0);
        }
        Ok(())
    }

    #[test]
    fn test_configured_recording_is_loaded() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("water.wav");
        let recording = wav(11_025, 16, 2, &[0u8; 441]);
        std::fs::write(&path, &recording)?;

        let mut settings = Settings::default();
        settings.clips.insert("water".to_string(), path);
        let clips = ClipTable::from_settings(&settings)?;

        assert_eq!(clips.get("water").map(|c| c.to_vec()), Some(recording));
        // The other binding still gets its chime
        assert!(clips.get("restroom").is_some_and(|c| c.len() > 44));
        Ok(())
    }

    #[test]
    fn test_every_binding_has_a_distinct_chime() -> Result<(), Box<dyn Error>> {
        let clips = ClipTable::from_settings(&Settings::default())?;
        for binding in &ALERT_BINDINGS {
            assert!(clips.get(binding.clip).is_some(), "no clip for {}", binding.label);
        }
        assert_ne!(clips.get(ALERT_BINDINGS[0].clip), clips.get(ALERT_BINDINGS[1].clip));
        Ok(())
    }

    #[test]
    fn test_broken_recording_rejected_at_startup() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("restroom.wav");
        let mut recording = wav(8000, 16, 1, &[0u8; 64]);
        recording[8..12].copy_from_slice(b"AVI ");
        std::fs::write(&path, &recording)?;

        let mut settings = Settings::default();
        settings.clips.insert("restroom".to_string(), path);

        match ClipTable::from_settings(&settings) {
            Err(AudioError::InvalidClip { name, source }) => {
                assert_eq!(name, "restroom");
                assert_eq!(source, DecodeError::BadMarker { offset: 8, expected: "WAVE" });
            }
            other => panic!("expected InvalidClip, got {:?}", other.map(|c| c.len())),
        }
        Ok(())
    }

    #[test]
    fn test_unreadable_recording_is_io_error() {
        let mut settings = Settings::default();
        settings.clips.insert("water".to_string(), "/nonexistent/carecall/water.wav".into());
        assert!(matches!(ClipTable::from_settings(&settings), Err(AudioError::IoError(_))));
    }

    #[tokio::test]
    async fn test_null_backend_plays_in_real_time() -> Result<(), Box<dyn Error>> {
        let settings = Settings::default();
        let device = open_output_device(&settings)?;
        // 8000 Hz mono 16-bit: 1600 bytes is 100 ms
        let clips = ClipTable::new().with_clip("water", wav(8000, 16, 1, &[0u8; 1600]));
        let playback = PlaybackOrchestrator::new(clips, device);

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(StdDuration::from_secs(5), playback.play("water")).await?;
        assert_eq!(outcome, Ok(PlaybackOutcome::Complete));
        assert!(started.elapsed() >= StdDuration::from_millis(80));
        assert!(!playback.is_busy());
        Ok(())
    }

    #[cfg(not(feature = "alsa"))]
    #[test]
    fn test_alsa_backend_needs_feature() {
        let settings = Settings { output_backend: OutputBackend::Alsa, ..Settings::default() };
        assert!(matches!(open_output_device(&settings), Err(AudioError::InitializationError(_))));
    }
}
