//! Integration tests for the request -> controller -> LED/prompt flow
//!
//! These drive the controller loop the way the binary wires it: request
//! sources and the ticker share one queue.

use crate::test_utils::{rig, wait_for_update, wav};
use carecall::alert::{
    run_controller_loop, AlertController, AlertKind, AlertMode, AlertUpdate, ControllerEvent, IntervalTicker, ManualTicker,
    OutputChannel, RecordingChannel, TickSource, EVENT_QUEUE_CAPACITY,
};
use carecall::audio::{ClipTable, MockOutputDevice, PlaybackOrchestrator};
use carecall::request::{spawn_source, RequestEvent, RequestOrigin, SerialReader};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};

/// LED that counts every moment it is lit together with its sibling.
struct ExclusiveLed {
    bit: u8,
    lit: Arc<AtomicU8>,
    violations: Arc<AtomicUsize>,
}

impl OutputChannel for ExclusiveLed {
    fn set(&self, on: bool) {
        if on {
            let before = self.lit.fetch_or(self.bit, Ordering::SeqCst);
            if before & !self.bit != 0 {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
        } else {
            self.lit.fetch_and(!self.bit, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &str {
        "exclusive"
    }
}

#[cfg(test)]
mod alert_flow_tests {
    use super::*;

    #[test]
    fn test_concurrent_requests_never_light_both_leds() {
        let lit = Arc::new(AtomicU8::new(0));
        let violations = Arc::new(AtomicUsize::new(0));
        let led = |bit| Arc::new(ExclusiveLed { bit, lit: lit.clone(), violations: violations.clone() }) as Arc<dyn OutputChannel>;
        let controller = Arc::new(AlertController::new([led(1), led(2)], Arc::new(ManualTicker::new())));

        let workers: Vec<_> = (0..4u32)
            .map(|seed| {
                let controller = controller.clone();
                std::thread::spawn(move || {
                    let mut x = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
                    for _ in 0..2_000 {
                        x ^= x << 13;
                        x ^= x >> 17;
                        x ^= x << 5;
                        match x % 3 {
                            0 => {
                                controller.toggle(AlertKind::Water);
                            }
                            1 => {
                                controller.toggle(AlertKind::Washroom);
                            }
                            _ => {
                                controller.on_tick();
                            }
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        let lit = lit.load(Ordering::SeqCst);
        match controller.snapshot().mode {
            AlertMode::Idle => assert_eq!(lit, 0),
            AlertMode::Alert(AlertKind::Water) => assert_eq!(lit & 2, 0),
            AlertMode::Alert(AlertKind::Washroom) => assert_eq!(lit & 1, 0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_requests_drive_blinking_and_prompts() {
        let water = Arc::new(RecordingChannel::new("water"));
        let washroom = Arc::new(RecordingChannel::new("washroom"));
        let device = Arc::new(MockOutputDevice::new());
        let clips = ClipTable::new()
            .with_clip("water", wav(8000, 8, 1, &[128u8; 800]))
            .with_clip("restroom", wav(8000, 8, 1, &[128u8; 800]));
        let playback = Arc::new(PlaybackOrchestrator::new(clips, device.clone()));

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let ticker = Arc::new(IntervalTicker::new(StdDuration::from_millis(500), events_tx.clone()));
        let channels = [water.clone() as Arc<dyn OutputChannel>, washroom.clone() as Arc<dyn OutputChannel>];
        let controller = Arc::new(AlertController::new(channels, ticker.clone()).with_playback(playback, 20));
        water.clear();
        washroom.clear();
        let mut updates = controller.subscribe();
        let worker = tokio::spawn(run_controller_loop(controller.clone(), events_rx));

        let (mut port, link) = tokio::io::duplex(64);
        let reader = spawn_source(Box::new(SerialReader::new("link", link)), events_tx.clone(), shutdown_tx.subscribe());
        let within = StdDuration::from_secs(60);

        // Water request: LED on, then one prompt after 20 ticks of 500 ms
        port.write_all(b"w").await.unwrap();
        wait_for_update(&mut updates, within, |u| {
            matches!(u, AlertUpdate::ModeChanged { to: AlertMode::Alert(AlertKind::Water), .. })
        })
        .await;
        let requested = tokio::time::Instant::now();
        assert!(ticker.is_running());

        let started = wait_for_update(&mut updates, within, |u| matches!(u, AlertUpdate::PlaybackStarted { .. })).await;
        assert_eq!(started, AlertUpdate::PlaybackStarted { clip: "water".to_string(), duration_ms: 100 });
        let elapsed = requested.elapsed();
        assert!(elapsed >= StdDuration::from_secs(10) && elapsed < StdDuration::from_millis(10_500));
        // Initial on plus 20 blinks, ending on
        assert_eq!(water.history().len(), 21);
        assert!(water.is_on());
        assert!(washroom.history().is_empty());

        // Washroom pre-empts
        port.write_all(b"T").await.unwrap();
        wait_for_update(&mut updates, within, |u| {
            matches!(u, AlertUpdate::ModeChanged { to: AlertMode::Alert(AlertKind::Washroom), .. })
        })
        .await;
        assert!(!water.is_on());
        assert!(washroom.is_on());
        assert_eq!(controller.snapshot().repeat_counter, 0);

        // Same request again cancels
        port.write_all(b"t").await.unwrap();
        wait_for_update(&mut updates, within, |u| matches!(u, AlertUpdate::ModeChanged { to: AlertMode::Idle, .. })).await;
        assert!(!water.is_on());
        assert!(!washroom.is_on());
        assert!(!ticker.is_running());

        events_tx.send(ControllerEvent::Shutdown).await.unwrap();
        worker.await.unwrap();
        let _ = shutdown_tx.send(());
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_prompt_failure_leaves_alert_running() {
        let rig = rig(2);
        rig.device.reject_submissions("codec not ready");
        let mut updates = rig.controller.subscribe();

        rig.controller.handle_request(RequestEvent::toggle(AlertKind::Water, RequestOrigin::Button));
        rig.controller.on_tick();
        rig.controller.on_tick();

        let rejected = wait_for_update(&mut updates, StdDuration::from_secs(2), |u| {
            matches!(u, AlertUpdate::PlaybackRejected { .. })
        })
        .await;
        assert!(matches!(rejected, AlertUpdate::PlaybackRejected { ref clip, .. } if clip == "water"));
        assert!(!rig.playback.is_busy());

        let snapshot = rig.controller.snapshot();
        assert_eq!(snapshot.mode, AlertMode::Alert(AlertKind::Water));
        assert!(snapshot.blink_on);
        assert_eq!(rig.water.history(), vec![false, true, false, true]);
    }

    #[tokio::test]
    async fn test_prompt_completion_is_reported() {
        let rig = rig(1);
        let mut updates = rig.controller.subscribe();

        rig.controller.toggle(AlertKind::Washroom);
        rig.controller.on_tick();
        assert_eq!(rig.device.submit_count(), 1);
        assert!(rig.playback.is_busy());

        rig.device.complete();
        let finished = wait_for_update(&mut updates, StdDuration::from_secs(2), |u| {
            matches!(u, AlertUpdate::PlaybackFinished { .. })
        })
        .await;
        assert!(matches!(finished, AlertUpdate::PlaybackFinished { ref clip, .. } if clip == "restroom"));
        assert!(!rig.playback.is_busy());

        // Device free again: the next tick speaks once more
        rig.controller.on_tick();
        assert_eq!(rig.device.submit_count(), 2);
        assert_eq!(rig.ticker.starts(), 1);
    }
}
