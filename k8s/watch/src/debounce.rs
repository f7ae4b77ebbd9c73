use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant};

/// Coalesces bursts of change events into single reconcile triggers.
///
/// Each incoming reason restarts the quiescence window; once `period`
/// elapses with no new events, the accumulated reason string is emitted.
/// Emissions are additionally floored to one per `period / 2`, so event
/// storms cannot produce back-to-back reconciles.
pub async fn run(
    mut events: UnboundedReceiver<String>,
    period: Duration,
    out: UnboundedSender<String>,
) {
    let min_interval = period / 2;
    let mut last_fire: Option<Instant> = None;

    while let Some(first) = events.recv().await {
        let mut pending = first;
        let closed = loop {
            match time::timeout(period, events.recv()).await {
                Ok(Some(reason)) => {
                    pending.push_str("; ");
                    pending.push_str(&reason);
                }
                Ok(None) => break true,
                Err(_) => break false,
            }
        };

        if let Some(last) = last_fire {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                time::sleep(min_interval - elapsed).await;
            }
        }
        last_fire = Some(Instant::now());
        if out.send(pending).is_err() || closed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PERIOD: Duration = Duration::from_secs(3);

    fn harness() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
        tokio::task::JoinHandle<()>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(event_rx, PERIOD, out_tx));
        (event_tx, out_rx, task)
    }

    #[tokio::test(start_paused = true)]
    async fn a_burst_emits_exactly_one_reconcile() {
        let (events, mut out, _task) = harness();
        for i in 0..5 {
            events.send(format!("update ns/obj-{i}")).unwrap();
            time::advance(Duration::from_millis(100)).await;
        }
        time::advance(PERIOD).await;

        let reason = out.recv().await.unwrap();
        assert!(reason.contains("obj-0"));
        assert!(reason.contains("obj-4"));
        assert_eq!(reason.matches(';').count(), 4);

        // Nothing further without new events.
        time::advance(PERIOD * 4).await;
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn events_inside_the_window_keep_deferring() {
        let (events, mut out, _task) = harness();
        events.send("add a".into()).unwrap();
        for _ in 0..4 {
            time::advance(PERIOD - Duration::from_millis(1)).await;
            assert!(out.try_recv().is_err());
            events.send("add more".into()).unwrap();
        }
        time::advance(PERIOD).await;
        assert!(out.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_emit_separately() {
        let (events, mut out, _task) = harness();
        events.send("add a".into()).unwrap();
        time::advance(PERIOD).await;
        assert_eq!(out.recv().await.unwrap(), "add a");

        time::advance(PERIOD * 2).await;
        events.send("delete a".into()).unwrap();
        time::advance(PERIOD).await;
        assert_eq!(out.recv().await.unwrap(), "delete a");
    }

    #[tokio::test(start_paused = true)]
    async fn emissions_are_floored_to_half_a_period() {
        let (events, mut out, _task) = harness();
        events.send("first".into()).unwrap();
        time::advance(PERIOD).await;
        let started = Instant::now();
        assert!(out.recv().await.is_some());

        // A second burst arrives immediately; it may not fire before the
        // rate floor elapses even though it quiesces sooner.
        events.send("second".into()).unwrap();
        time::advance(PERIOD).await;
        assert!(out.recv().await.is_some());
        assert!(started.elapsed() >= PERIOD / 2);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_input_flushes_and_stops() {
        let (events, mut out, task) = harness();
        events.send("pending".into()).unwrap();
        drop(events);
        time::advance(PERIOD).await;
        assert_eq!(out.recv().await.unwrap(), "pending");
        assert!(out.recv().await.is_none());
        task.await.unwrap();
    }
}
