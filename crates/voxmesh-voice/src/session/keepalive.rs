//! Heartbeat ticker and one-shot timers.
//!
//! Both only post [`Timer`]s back to the session task; the task does the
//! actual sending. Each is tied to a cancellation token that the session
//! cancels whenever its signaling link goes away.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::Timer;

/// Tick every `interval` until cancelled. The immediate first tick of
/// `tokio::time::interval` is skipped: `join` was just sent.
pub(crate) fn spawn_heartbeat(
    interval: Duration,
    epoch: u64,
    cancel: CancellationToken,
    timers: mpsc::UnboundedSender<Timer>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if timers.send(Timer::Heartbeat { epoch }).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Post `timer` after `delay` unless cancelled first.
pub(crate) fn schedule(
    delay: Duration,
    timer: Timer,
    cancel: CancellationToken,
    timers: mpsc::UnboundedSender<Timer>,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let _ = timers.send(timer);
            }
        }
    });
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
pub(crate) fn backoff(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}
