//! The cron schedule loop.
//!
//! A single task owns the loop. Each cycle it computes the next occurrence of
//! every active schedule against the local clock, takes the earliest and
//! waits for it. Long waits are split in halves until less than
//! [`EXACT_SLEEP_CUTOFF`] remains, so a wall clock adjustment is noticed
//! early. Adding a schedule interrupts the wait and the minimum is
//! recomputed.
//!
//! When the instant is reached, every schedule due at that instant is spawned
//! and the loop pauses for one second so the same occurrence cannot fire
//! twice.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use amethyst_core::{BoxFuture, HandlerResult};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::plugin::PluginId;
use crate::widget::CronExpr;

/// Remaining durations below this are slept in one go.
pub const EXACT_SLEEP_CUTOFF: Duration = Duration::from_secs(30);

/// Pause after firing, so an occurrence is never fired twice.
const FIRE_COOLDOWN: Duration = Duration::from_secs(1);

/// A bound schedule callback.
pub(crate) type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// ============================================================================
// ScheduledTask
// ============================================================================

/// A schedule bound to its plugin instance.
#[derive(Clone)]
pub struct ScheduledTask {
    cron: CronExpr,
    label: String,
    owner: Option<PluginId>,
    callback: TaskFn,
}

impl ScheduledTask {
    pub(crate) fn new(
        cron: CronExpr,
        label: String,
        owner: Option<PluginId>,
        callback: TaskFn,
    ) -> Self {
        Self {
            cron,
            label,
            owner,
            callback,
        }
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The cron expression.
    pub fn cron(&self) -> &CronExpr {
        &self.cron
    }

    /// Owning plugin, if any.
    pub fn owner(&self) -> Option<PluginId> {
        self.owner
    }

    /// Next occurrence strictly after `now`.
    pub fn next_after(&self, now: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.cron.next_after(now)
    }

    fn fire(&self) -> JoinHandle<()> {
        let label = self.label.clone();
        let run = (self.callback)();
        tokio::spawn(async move {
            if let Err(err) = run.await {
                error!(schedule = %label, "Scheduled task failed: {err}");
            }
        })
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("cron", &self.cron)
            .field("label", &self.label)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Connection state consulted before firing.
pub trait Lifecycle: Send + Sync {
    /// The gateway connection is established.
    fn is_ready(&self) -> bool;

    /// The client is shutting down.
    fn is_closed(&self) -> bool;
}

/// The set of active schedules and the loop that fires them.
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
    changed: Notify,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schedule, interrupting the current wait.
    pub fn add(&self, task: ScheduledTask) {
        debug!(schedule = %task.label, cron = %task.cron, "Schedule added");
        self.tasks.lock().push(task);
        self.changed.notify_one();
    }

    /// Number of active schedules.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Whether the loop has been started.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the loop. Returns `None` if it is already running.
    pub fn spawn(
        self: &Arc<Self>,
        lifecycle: Arc<dyn Lifecycle>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            scheduler.run(lifecycle, shutdown).await;
            scheduler.running.store(false, Ordering::Release);
        }))
    }

    /// The earliest occurrence after `now` and every schedule due at it.
    pub fn due_at(&self, now: DateTime<Local>) -> Option<(DateTime<Local>, Vec<ScheduledTask>)> {
        let tasks = self.tasks.lock();
        let upcoming: Vec<_> = tasks
            .iter()
            .filter_map(|task| task.next_after(&now).map(|at| (at, task)))
            .collect();

        let earliest = upcoming.iter().map(|(at, _)| *at).min()?;
        let due = upcoming
            .into_iter()
            .filter(|(at, _)| *at == earliest)
            .map(|(_, task)| task.clone())
            .collect();
        Some((earliest, due))
    }

    async fn run(&self, lifecycle: Arc<dyn Lifecycle>, shutdown: CancellationToken) {
        info!(schedules = self.len(), "Schedule loop started");

        while !shutdown.is_cancelled() && !lifecycle.is_closed() {
            let Some((at, due)) = self.due_at(Local::now()) else {
                // Nothing to wait for until a schedule is added.
                tokio::select! {
                    _ = self.changed.notified() => {}
                    _ = shutdown.cancelled() => {}
                }
                continue;
            };

            tokio::select! {
                _ = wait_until(at) => {}
                _ = self.changed.notified() => {
                    trace!("Schedule set changed, recomputing");
                    continue;
                }
                _ = shutdown.cancelled() => break,
            }

            if lifecycle.is_ready() {
                for task in &due {
                    trace!(schedule = %task.label, "Firing schedule");
                    task.fire();
                }
            } else {
                debug!(count = due.len(), "Skipping schedules, client not ready");
            }

            tokio::select! {
                _ = tokio::time::sleep(FIRE_COOLDOWN) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Schedule loop stopped");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &*self.tasks.lock())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Sleeps until the local clock reaches `at`.
async fn wait_until(at: DateTime<Local>) {
    wait_until_by(at, Local::now).await;
}

/// [`wait_until`] against the clock `now`.
async fn wait_until_by(at: DateTime<Local>, now: impl Fn() -> DateTime<Local>) {
    loop {
        let Ok(remaining) = (at - now()).to_std() else {
            return;
        };
        let step = halving_step(remaining);
        tokio::time::sleep(step).await;
        if step == remaining {
            return;
        }
    }
}

/// Half of `remaining` while it exceeds the cutoff, the whole of it after.
fn halving_step(remaining: Duration) -> Duration {
    if remaining > EXACT_SLEEP_CUTOFF {
        remaining / 2
    } else {
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use chrono::{TimeZone, Timelike};
    use futures::FutureExt;

    fn task(cron: &str, label: &str, hits: &Arc<AtomicUsize>) -> ScheduledTask {
        let hits = Arc::clone(hits);
        ScheduledTask::new(
            CronExpr::parse(cron).unwrap(),
            label.to_string(),
            None,
            Arc::new(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    HandlerResult::Ok(())
                }
                .boxed()
            }),
        )
    }

    #[test]
    fn test_halving_step() {
        assert_eq!(halving_step(Duration::from_secs(120)), Duration::from_secs(60));
        assert_eq!(halving_step(Duration::from_secs(31)), Duration::from_millis(15_500));
        assert_eq!(halving_step(Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(halving_step(Duration::from_millis(10)), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_schedules_sharing_the_earliest_occurrence_fire_together() {
        let hits = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new();
        scheduler.add(task("0 * * * *", "hourly", &hits));
        scheduler.add(task("0 */2 * * *", "every_two_hours", &hits));
        scheduler.add(task("30 * * * *", "half_past", &hits));

        let now = Local.with_ymd_and_hms(2024, 3, 4, 9, 45, 0).unwrap();
        let (at, due) = scheduler.due_at(now).unwrap();
        assert_eq!((at.hour(), at.minute()), (10, 0));

        let labels: Vec<_> = due.iter().map(ScheduledTask::label).collect();
        assert_eq!(labels, vec!["hourly", "every_two_hours"]);

        for task in &due {
            task.fire().await.unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_scheduler_has_nothing_due() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_empty());
        assert!(scheduler.due_at(Local::now()).is_none());
    }

    struct Ready;

    impl Lifecycle for Ready {
        fn is_ready(&self) -> bool {
            true
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_loop_starts_once_and_stops_on_shutdown() {
        let hits = Arc::new(AtomicUsize::new(0));
        let scheduler = Arc::new(Scheduler::new());
        scheduler.add(task("* * * * * *", "every_second", &hits));

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(Arc::new(Ready), shutdown.clone()).unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.spawn(Arc::new(Ready), shutdown.clone()).is_none());

        shutdown.cancel();
        handle.await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_added_schedule_interrupts_a_long_wait() {
        let hits = Arc::new(AtomicUsize::new(0));
        let scheduler = Arc::new(Scheduler::new());
        scheduler.add(task("0 0 1 1 *", "new_year", &hits));

        let shutdown = CancellationToken::new();
        let handle = scheduler.spawn(Arc::new(Ready), shutdown.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        scheduler.add(task("* * * * * *", "every_second", &hits));
        let fired = tokio::time::timeout(Duration::from_secs(3), async {
            while hits.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(fired.is_ok(), "the new schedule never fired");

        shutdown.cancel();
        handle.await.unwrap();
    }

    /// A local clock that follows tokio's, plus `jump` once `after` has passed.
    fn paused_clock(
        after: Duration,
        jump: chrono::Duration,
    ) -> impl Fn() -> DateTime<Local> {
        let base = Local::now();
        let start = tokio::time::Instant::now();
        move || {
            let elapsed = start.elapsed();
            let now = base + chrono::Duration::from_std(elapsed).unwrap();
            if elapsed >= after { now + jump } else { now }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_halves_long_waits() {
        let clock = paused_clock(Duration::MAX, chrono::Duration::zero());
        let start = tokio::time::Instant::now();
        wait_until_by(clock() + chrono::Duration::minutes(2), &clock).await;
        // 60s, then 30s, then the remaining 30s in one go.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(120) && waited < Duration::from_secs(121));

        let start = tokio::time::Instant::now();
        wait_until_by(clock() - chrono::Duration::seconds(5), &clock).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_notices_clock_jumps() {
        let clock = paused_clock(Duration::from_secs(1), chrono::Duration::hours(1));
        let start = tokio::time::Instant::now();
        wait_until_by(clock() + chrono::Duration::hours(2), &clock).await;
        // The first half is slept, then the adjusted clock is already there.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3600) && waited < Duration::from_secs(3601));
    }
}
