//! Integration tests for the playback session
//!
//! These tests drive a real session over WAV files and a recording device.

use crate::test_utils::{collect_events_until, test_session, wait_for, write_sine_wav, TestDevice};
use koalad::player::{PlaybackError, PlaybackSession, PlaybackState, SessionEvent};
use std::error::Error;
use std::time::Duration;
use tempfile::tempdir;

#[cfg(test)]
mod session_integration_tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_backend_initializes_once_per_process() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let first = dir.path().join("first.wav");
        let second = dir.path().join("second.wav");
        write_sine_wav(&first, 44_100, 2, 2.0)?;
        write_sine_wav(&second, 44_100, 1, 2.0)?;

        let (session, log) = test_session();
        session.start_track(&first)?;
        session.start_track(&second)?;
        session.start_track(&first)?;

        let log = log.lock().unwrap().clone();
        assert_eq!(log.opens.len(), 1);
        assert_eq!(log.opens[0].sample_rate, 44_100);
        assert_eq!(log.opens[0].buffer_frames, 4410);
        assert_eq!(log.opens[0].channels, 2);
        assert_eq!(session.backend().init_count(), 1);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_new_track_preempts_current() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let long = dir.path().join("long.wav");
        let short = dir.path().join("short.wav");
        write_sine_wav(&long, 44_100, 2, 8.0)?;
        write_sine_wav(&short, 44_100, 2, 0.4)?;

        let (session, _log) = test_session();
        let mut events = session.subscribe();
        let a = session.start_track(&long)?;
        let b = session.start_track(&short)?;
        assert_ne!(a.id, b.id);
        assert_eq!(session.open_handles(), 1);
        assert_eq!(session.status().track.map(|t| t.id), Some(b.id));

        let (seen, finished) = collect_events_until(&mut events, TIMEOUT, |e| {
            matches!(e, SessionEvent::Finished { id } if *id == b.id)
        });
        assert!(finished, "second track never finished: {:?}", seen);
        assert!(seen.contains(&SessionEvent::Stopped { id: a.id }));
        assert!(!seen.contains(&SessionEvent::Finished { id: a.id }));
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.open_handles(), 0);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_volume_is_additive_and_unclamped() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 8.0)?;

        let (session, _log) = test_session();
        session.start_track(&path)?;
        assert_eq!(session.set_volume_delta(1.0)?, 1.0);
        assert_eq!(session.set_volume_delta(1.0)?, 2.0);
        let status = session.status();
        assert_eq!(status.gain, Some(2.0));
        assert_eq!(status.multiplier, Some(4.0));

        assert_eq!(session.set_volume_delta(-10.0)?, -8.0);
        assert_eq!(session.set_volume_delta(20.0)?, 12.0);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_toggle_pause_twice_restores_playing() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 8.0)?;

        let (session, _log) = test_session();
        session.start_track(&path)?;
        assert!(session.toggle_pause()?);
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(session.status().paused);
        assert!(!session.toggle_pause()?);
        assert_eq!(session.state(), PlaybackState::Playing);
        assert!(!session.status().paused);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_paused_track_does_not_finish() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 2.0)?;

        let (session, _log) = test_session();
        let mut events = session.subscribe();
        let track = session.start_track(&path)?;
        session.toggle_pause()?;

        let (_, finished) = collect_events_until(&mut events, Duration::from_millis(500), |e| {
            matches!(e, SessionEvent::Finished { .. })
        });
        assert!(!finished);
        assert_eq!(session.state(), PlaybackState::Paused);

        session.toggle_pause()?;
        let (seen, finished) = collect_events_until(&mut events, TIMEOUT, |e| {
            matches!(e, SessionEvent::Finished { id } if *id == track.id)
        });
        assert!(finished, "track never finished after resume: {:?}", seen);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_controls_require_an_active_track() {
        let (session, log) = test_session();
        assert_eq!(session.set_volume_delta(1.0), Err(PlaybackError::NoActiveTrack));
        assert_eq!(session.toggle_pause(), Err(PlaybackError::NoActiveTrack));
        assert_eq!(
            PlaybackError::NoActiveTrack.to_string(),
            "No music is currently playing"
        );
        assert_eq!(session.state(), PlaybackState::Idle);
        assert!(log.lock().unwrap().opens.is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 8.0)?;

        let (session, _log) = test_session();
        assert!(!session.stop());
        session.start_track(&path)?;
        assert!(session.stop());
        assert!(!session.stop());
        assert!(!session.stop());
        assert_eq!(session.state(), PlaybackState::Idle);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_stop_releases_handles_and_detaches() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 8.0)?;

        let (session, _log) = test_session();
        let track = session.start_track(&path)?;
        assert!(wait_for(TIMEOUT, || session.backend().attached_graph() == Some(track.id)));
        assert_eq!(session.open_handles(), 1);

        session.stop();
        assert_eq!(session.open_handles(), 0);
        assert_eq!(session.backend().attached_graph(), None);
        assert!(session.status().track.is_none());

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_stop_right_after_start_never_attaches() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 8.0)?;

        let (session, _log) = test_session();
        for _ in 0..10 {
            session.start_track(&path)?;
            session.stop();
            assert_eq!(session.backend().attached_graph(), None);
        }
        // Late render threads must not revive a stopped track.
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(session.backend().attached_graph(), None);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.open_handles(), 0);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_unplayable_paths_are_rejected() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not audio at all")?;
        let good = dir.path().join("tone.wav");
        write_sine_wav(&good, 44_100, 2, 8.0)?;

        let (session, log) = test_session();
        let mut events = session.subscribe();

        let missing = session.start_track(&dir.path().join("missing.wav"));
        assert!(matches!(missing, Err(PlaybackError::ResolveFailed { .. })));
        let unsupported = session.start_track(&text);
        assert!(matches!(unsupported, Err(PlaybackError::ResolveFailed { .. })));
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.open_handles(), 0);
        assert!(log.lock().unwrap().opens.is_empty());

        let (seen, _) = collect_events_until(&mut events, Duration::from_millis(100), |_| false);
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, SessionEvent::Error { .. }))
                .count(),
            2
        );

        session.start_track(&good)?;
        assert_eq!(session.state(), PlaybackState::Playing);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_backend_failure_is_reported() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 44_100, 2, 1.0)?;

        let (device, log) = TestDevice::failing();
        let session = PlaybackSession::with_device(Box::new(device));
        let result = session.start_track(&path);
        assert!(matches!(result, Err(PlaybackError::BackendInitFailed(_))));
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.open_handles(), 0);

        // A later start retries the device.
        assert!(session.start_track(&path).is_err());
        assert_eq!(log.lock().unwrap().opens.len(), 2);

        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_natural_completion_returns_to_idle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("short.wav");
        write_sine_wav(&path, 44_100, 2, 0.4)?;

        let (session, log) = test_session();
        let mut events = session.subscribe();
        let track = session.start_track(&path)?;
        assert_eq!(track.descriptor.sample_rate, 44_100);
        assert_eq!(track.descriptor.channels, 2);

        let (seen, finished) = collect_events_until(&mut events, TIMEOUT, |e| {
            matches!(e, SessionEvent::Finished { .. })
        });
        assert!(finished, "track never finished: {:?}", seen);
        assert!(seen.contains(&SessionEvent::Started {
            id: track.id,
            path: path.clone()
        }));
        assert!(wait_for(TIMEOUT, || session.state() == PlaybackState::Idle));
        assert_eq!(session.open_handles(), 0);
        assert!(log.lock().unwrap().samples_written > 0);

        session.shutdown();
        assert!(log.lock().unwrap().closed);
        Ok(())
    }

    #[test]
    fn test_other_rates_are_resampled_to_device_rate() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let cd = dir.path().join("cd.wav");
        let low = dir.path().join("low.wav");
        write_sine_wav(&cd, 44_100, 2, 4.0)?;
        write_sine_wav(&low, 22_050, 1, 0.5)?;

        let (session, log) = test_session();
        let mut events = session.subscribe();
        session.start_track(&cd)?;
        let track = session.start_track(&low)?;
        assert_eq!(track.descriptor.sample_rate, 22_050);

        let status = session.status();
        assert_eq!(status.backend.map(|b| b.sample_rate), Some(44_100));
        assert_eq!(log.lock().unwrap().opens.len(), 1);

        let (seen, finished) = collect_events_until(&mut events, TIMEOUT, |e| {
            matches!(e, SessionEvent::Finished { id } if *id == track.id)
        });
        assert!(finished, "resampled track never finished: {:?}", seen);

        session.shutdown();
        Ok(())
    }
}
