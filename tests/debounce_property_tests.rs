//! Property-based tests for the input debouncer
//!
//! Uses proptest to check the debounce guarantees over arbitrary edge sequences.

use pideck::metrics::Metrics;
use pideck::models::{Edge, InputSource, RawInputEvent, TouchRegion};
use pideck::services::{InputDebouncer, InputDecodeError, Rejection};
use pideck::{Action, Settings};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

const WINDOW: Duration = Duration::from_millis(300);
const PIN: u8 = 17;

fn debouncer() -> InputDebouncer {
    InputDebouncer::new(WINDOW).with_binding(InputSource::Gpio(PIN), Edge::Falling, Action::PlayPause)
}

fn press(base: Instant, offset_ms: u64) -> RawInputEvent {
    RawInputEvent::new(
        InputSource::Gpio(PIN),
        Edge::Falling,
        base + Duration::from_millis(offset_ms),
    )
}

/// Sorted press offsets in milliseconds
fn arb_offsets() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..5_000, 1..40).prop_map(|mut offsets| {
        offsets.sort_unstable();
        offsets
    })
}

proptest! {
    #[test]
    fn prop_accepted_presses_are_a_window_apart(offsets in arb_offsets()) {
        let mut debouncer = debouncer();
        let base = Instant::now();

        let accepted: Vec<u64> = offsets
            .iter()
            .filter(|&&offset| matches!(debouncer.accept(&press(base, offset)), Ok(Ok(_))))
            .copied()
            .collect();

        // The first press is never filtered
        prop_assert_eq!(accepted.first(), offsets.first());
        for pair in accepted.windows(2) {
            prop_assert!(pair[1] - pair[0] >= WINDOW.as_millis() as u64);
        }
    }

    #[test]
    fn prop_matches_reference_model(offsets in arb_offsets()) {
        let mut debouncer = debouncer();
        let base = Instant::now();

        let mut last: Option<u64> = None;
        for offset in offsets {
            let expected = match last {
                Some(prev) if offset - prev < WINDOW.as_millis() as u64 => false,
                _ => true,
            };
            if expected {
                last = Some(offset);
            }

            let result = debouncer.accept(&press(base, offset)).unwrap();
            prop_assert_eq!(result.is_ok(), expected, "offset {}", offset);
            if !expected {
                prop_assert_eq!(result, Err(Rejection::TooSoon));
            }
        }
    }

    #[test]
    fn prop_release_edges_never_fire(offsets in arb_offsets()) {
        let mut debouncer = debouncer();
        let base = Instant::now();

        for offset in offsets {
            let release = RawInputEvent::new(
                InputSource::Gpio(PIN),
                Edge::Rising,
                base + Duration::from_millis(offset),
            );
            prop_assert_eq!(debouncer.accept(&release).unwrap(), Err(Rejection::NotPress));
        }
    }

    #[test]
    fn prop_sources_are_debounced_independently(gap_ms in 0u64..300) {
        let mut debouncer = InputDebouncer::new(WINDOW)
            .with_binding(InputSource::Gpio(5), Edge::Falling, Action::Next)
            .with_binding(InputSource::Touch(TouchRegion::Stop), Edge::Falling, Action::Stop);
        let base = Instant::now();
        let later = base + Duration::from_millis(gap_ms);

        let first = debouncer.accept(&RawInputEvent::new(InputSource::Gpio(5), Edge::Falling, base));
        let other = debouncer.accept(&RawInputEvent::new(
            InputSource::Touch(TouchRegion::Stop),
            Edge::Falling,
            later,
        ));

        prop_assert_eq!(first, Ok(Ok(Action::Next)));
        prop_assert_eq!(other, Ok(Ok(Action::Stop)));
    }
}

#[test]
fn test_two_edges_50ms_apart_yield_one_action() {
    let mut debouncer = debouncer();
    let base = Instant::now();

    assert_eq!(debouncer.accept(&press(base, 0)), Ok(Ok(Action::PlayPause)));
    assert_eq!(debouncer.accept(&press(base, 50)), Ok(Err(Rejection::TooSoon)));
    // Released and pressed again once the window has passed
    assert_eq!(debouncer.accept(&press(base, 300)), Ok(Ok(Action::PlayPause)));
}

#[test]
fn test_earlier_timestamp_is_out_of_order() {
    let mut debouncer = debouncer();
    let base = Instant::now() + Duration::from_secs(1);

    debouncer.accept(&press(base, 500)).unwrap().unwrap();
    let result = debouncer.accept(&press(base, 100)).unwrap();

    assert_eq!(result, Err(Rejection::OutOfOrder));
}

#[test]
fn test_unbound_source_is_a_decode_error() {
    let mut debouncer = debouncer();
    let event = RawInputEvent::new(InputSource::Gpio(2), Edge::Falling, Instant::now());

    assert_eq!(
        debouncer.accept(&event),
        Err(InputDecodeError::UnknownSource(InputSource::Gpio(2)))
    );
}

#[test]
fn test_active_high_buttons_press_on_rising_edge() {
    let mut settings = Settings::default();
    settings.gpio.active_low = false;
    let mut debouncer = InputDebouncer::from_settings(&settings);
    let now = Instant::now();

    let rising = RawInputEvent::new(InputSource::Gpio(4), Edge::Rising, now);
    let falling = RawInputEvent::new(InputSource::Gpio(23), Edge::Falling, now);

    assert_eq!(debouncer.accept(&rising), Ok(Ok(Action::PlayPause)));
    assert_eq!(debouncer.accept(&falling), Ok(Err(Rejection::NotPress)));
}

#[tokio::test]
async fn test_run_forwards_one_action_for_a_bounce() {
    let (raw_tx, raw_rx) = mpsc::channel(16);
    let (action_tx, mut action_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    let handle = tokio::spawn(debouncer().run(raw_rx, action_tx, shutdown_rx, Arc::clone(&metrics)));

    let base = Instant::now();
    raw_tx.send(press(base, 0)).await.unwrap();
    raw_tx
        .send(RawInputEvent::new(
            InputSource::Gpio(PIN),
            Edge::Rising,
            base + Duration::from_millis(20),
        ))
        .await
        .unwrap();
    raw_tx.send(press(base, 50)).await.unwrap();
    raw_tx
        .send(RawInputEvent::new(InputSource::Gpio(3), Edge::Falling, base))
        .await
        .unwrap();
    drop(raw_tx);

    handle.await.unwrap();

    assert_eq!(action_rx.recv().await, Some(Action::PlayPause));
    assert_eq!(action_rx.recv().await, None);
    assert_eq!(metrics.events_accepted.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.events_rejected.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.events_undecodable.load(Ordering::Relaxed), 1);
}
