use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use log::warn;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use dartvision_core::Score;

/// A confirmed dart landing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// Fused tip coordinate on the board canvas.
    pub point: Point2<f32>,
    pub score: Score,
    /// Seconds since the detector started.
    pub timestamp_s: f64,
}

/// Events the detection loop publishes to the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VisionEvent {
    Hit(HitEvent),
    /// All tracked darts were pulled from the board.
    DartsRemoved,
}

/// Publishing half of the event channel. Sends never block the detection
/// loop: a full queue drops the event with a warning instead of stalling
/// frame capture.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: SyncSender<VisionEvent>,
}

/// The consumer hung up; the detection loop should stop.
#[derive(thiserror::Error, Debug)]
#[error("event consumer disconnected")]
pub struct ConsumerGone;

impl EventSender {
    pub fn send(&self, event: VisionEvent) -> Result<(), ConsumerGone> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                warn!("event queue full, dropping {dropped:?}");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(ConsumerGone),
        }
    }
}

/// Bounded event channel between the detection loop and its consumer.
pub fn event_channel(capacity: usize) -> (EventSender, Receiver<VisionEvent>) {
    let (tx, rx) = sync_channel(capacity);
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (tx, rx) = event_channel(4);
        let hit = VisionEvent::Hit(HitEvent {
            point: Point2::new(500.0, 430.0),
            score: Score {
                sector: 20,
                multiplier: 1,
                is_missed: false,
            },
            timestamp_s: 1.25,
        });
        tx.send(hit).unwrap();
        tx.send(VisionEvent::DartsRemoved).unwrap();

        assert_eq!(rx.recv().unwrap(), hit);
        assert_eq!(rx.recv().unwrap(), VisionEvent::DartsRemoved);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, rx) = event_channel(1);
        tx.send(VisionEvent::DartsRemoved).unwrap();
        // queue full: this send is dropped but still succeeds
        tx.send(VisionEvent::DartsRemoved).unwrap();
        assert_eq!(rx.recv().unwrap(), VisionEvent::DartsRemoved);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_consumer_is_reported() {
        let (tx, rx) = event_channel(1);
        drop(rx);
        assert!(tx.send(VisionEvent::DartsRemoved).is_err());
    }

    #[test]
    fn hit_events_serialize() {
        let hit = HitEvent {
            point: Point2::new(512.0, 500.0),
            score: Score {
                sector: 6,
                multiplier: 3,
                is_missed: false,
            },
            timestamp_s: 0.5,
        };
        let json = serde_json::to_string(&hit).unwrap();
        let back: HitEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hit);
    }
}
