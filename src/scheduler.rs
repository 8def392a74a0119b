//! Randomised run schedule.
//!
//! Each round waits a random activation delay, then stays active for a random
//! window, running a cycle at random intervals inside it. One cycle runs
//! immediately at start. Cycle failures are the caller's to log; the loop
//! only stops on shutdown.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Inclusive duration range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub min: Duration,
    pub max: Duration,
}

impl Span {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn secs(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Uniform pick in `[min, max]` at millisecond resolution.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rng.random_range(min..=max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleBounds {
    pub activation_delay: Span,
    pub active: Span,
    pub interval: Span,
}

impl Default for ScheduleBounds {
    fn default() -> Self {
        Self {
            activation_delay: Span::secs(0, 30 * 60),
            active: Span::secs(15 * 60, 20 * 60),
            interval: Span::secs(30, 180),
        }
    }
}

/// One activation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    pub activation_delay: Duration,
    pub active_for: Duration,
}

pub fn plan_round<R: Rng>(bounds: &ScheduleBounds, rng: &mut R) -> RoundPlan {
    RoundPlan {
        activation_delay: bounds.activation_delay.sample(rng),
        active_for: bounds.active.sample(rng),
    }
}

/// Sleep for `duration` unless shutdown fires first. Returns false on shutdown.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = shutdown.changed() => {
            // A dropped sender counts as shutdown.
            changed.is_ok() && !*shutdown.borrow()
        }
    }
}

/// Drive `cycle` on the randomised schedule until `shutdown` flips to true.
///
/// Returns the number of cycles started.
pub async fn run_schedule<F, Fut>(
    bounds: ScheduleBounds,
    mut shutdown: watch::Receiver<bool>,
    mut cycle: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut cycles = 0u64;

    info!("Running initial cycle");
    cycle().await;
    cycles += 1;

    loop {
        let plan = plan_round(&bounds, &mut rand::rng());
        info!(
            delay_secs = plan.activation_delay.as_secs(),
            active_secs = plan.active_for.as_secs(),
            "Planned next activation"
        );
        if !sleep_or_shutdown(plan.activation_delay, &mut shutdown).await {
            break;
        }

        let deactivate_at = Instant::now() + plan.active_for;
        info!("Activated");
        loop {
            let wait = bounds.interval.sample(&mut rand::rng());
            let now = Instant::now();
            if now + wait >= deactivate_at {
                // Sit out the rest of the window.
                if !sleep_or_shutdown(deactivate_at - now, &mut shutdown).await {
                    return cycles;
                }
                break;
            }
            debug!(wait_ms = wait.as_millis() as u64, "Waiting for next cycle");
            if !sleep_or_shutdown(wait, &mut shutdown).await {
                return cycles;
            }
            cycle().await;
            cycles += 1;
        }
        info!(cycles, "Deactivated");
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_bounds() {
        let b = ScheduleBounds::default();
        assert_eq!(b.activation_delay, Span::secs(0, 1800));
        assert_eq!(b.active, Span::secs(900, 1200));
        assert_eq!(b.interval, Span::secs(30, 180));
    }

    #[test]
    fn plans_stay_in_bounds() {
        let bounds = ScheduleBounds::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let plan = plan_round(&bounds, &mut rng);
            assert!(plan.activation_delay <= Duration::from_secs(1800));
            assert!(plan.active_for >= Duration::from_secs(900));
            assert!(plan.active_for <= Duration::from_secs(1200));
            let interval = bounds.interval.sample(&mut rng);
            assert!(interval >= Duration::from_secs(30) && interval <= Duration::from_secs(180));
        }
    }

    #[test]
    fn degenerate_span_returns_min() {
        let mut rng = StdRng::seed_from_u64(1);
        let span = Span::secs(5, 5);
        assert_eq!(span.sample(&mut rng), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn initial_cycle_runs_even_if_shut_down() {
        let (tx, rx) = watch::channel(true);
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let started = run_schedule(ScheduleBounds::default(), rx, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        drop(tx);
        assert_eq!(started, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn runs_cycles_until_shutdown() {
        let bounds = ScheduleBounds {
            activation_delay: Span::new(Duration::ZERO, Duration::from_millis(2)),
            active: Span::new(Duration::from_millis(40), Duration::from_millis(40)),
            interval: Span::new(Duration::from_millis(1), Duration::from_millis(3)),
        };
        let (tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let handle = tokio::spawn(run_schedule(bounds, rx, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let started = handle.await.unwrap();

        assert!(started > 2, "expected several cycles, got {started}");
        assert_eq!(started, count.load(Ordering::SeqCst));
    }
}
