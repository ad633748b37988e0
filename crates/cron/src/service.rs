//! Recurring job scheduler: per-job timer loops, execution with a busy
//! guard, and notification fanout to subscribed channels.

use std::{
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use {
    futures::FutureExt,
    ocean_common::ChannelOutbound,
    ocean_config::{ConfigManager, PluginConfig},
    ocean_store::SubscriptionStore,
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use ocean_metrics::{counter, cron as cron_metrics, gauge, histogram, labels};

use crate::{
    Error, Result,
    schedule::{compute_following_run, compute_next_run},
    types::{JobActionFn, JobInfo, JobSchedule, JobState, Notification, RunStatus, SchedulerStatus},
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct Job {
    name: String,
    schedule: JobSchedule,
    action: JobActionFn,
    busy: AtomicBool,
    state: Mutex<JobState>,
}

impl Job {
    fn update_state<F: FnOnce(&mut JobState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn info(&self) -> JobInfo {
        JobInfo {
            name: self.name.clone(),
            schedule: self.schedule.clone(),
            running: self.busy.load(Ordering::Acquire),
            state: self.state.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

/// Clears the busy flag when a run ends, including by panic.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The scheduler.
///
/// Jobs are registered once and live for the process. Each job has its own
/// timer loop; a tick that finds the job still running is skipped, never
/// queued. `stop` cancels the timers and waits for in-flight runs so a
/// fanout is never cut off halfway.
pub struct Scheduler {
    config: Arc<ConfigManager>,
    subscriptions: Arc<SubscriptionStore>,
    outbound: Arc<dyn ChannelOutbound>,
    jobs: RwLock<BTreeMap<String, Arc<Job>>>,
    cancel: Mutex<CancellationToken>,
    tracker: TaskTracker,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        config: Arc<ConfigManager>,
        subscriptions: Arc<SubscriptionStore>,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            subscriptions,
            outbound,
            jobs: RwLock::new(BTreeMap::new()),
            cancel: Mutex::new(CancellationToken::new()),
            tracker: TaskTracker::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Register a job. The schedule is validated up front. Registering while
    /// the scheduler runs starts the job's timer immediately.
    pub fn register(
        self: &Arc<Self>,
        name: impl Into<String>,
        schedule: JobSchedule,
        action: JobActionFn,
    ) -> Result<()> {
        let name = name.into();
        let next_run = compute_next_run(&schedule, now_ms())?;
        let job = Arc::new(Job {
            name: name.clone(),
            schedule,
            action,
            busy: AtomicBool::new(false),
            state: Mutex::new(JobState {
                next_run_at_ms: next_run,
                ..Default::default()
            }),
        });

        {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            if jobs.contains_key(&name) {
                return Err(Error::DuplicateJob { name });
            }
            jobs.insert(name.clone(), Arc::clone(&job));
            #[cfg(feature = "metrics")]
            gauge!(cron_metrics::JOBS_REGISTERED).set(jobs.len() as f64);
        }
        info!(job = %name, schedule = ?job.schedule, "registered job");

        if self.running.load(Ordering::Acquire) {
            self.spawn_timer(job);
        }
        Ok(())
    }

    /// Start one timer loop per registered job. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tracker.reopen();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();

        let jobs: Vec<Arc<Job>> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        info!(count = jobs.len(), "scheduler started");
        for job in jobs {
            self.spawn_timer(job);
        }
    }

    /// Stop scheduling new ticks and wait for in-flight runs to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("scheduler stopped");
    }

    /// Run one tick of `name` now, honoring the busy guard.
    pub async fn tick(&self, name: &str) -> Result<RunStatus> {
        let job = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Error::job_not_found(name))?;
        Ok(self.run_job(&job).await)
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::Acquire),
            jobs: self
                .jobs
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .map(|j| j.info())
                .collect(),
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    fn spawn_timer(self: &Arc<Self>, job: Arc<Job>) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let svc = Arc::clone(self);
        self.tracker.spawn(async move {
            svc.timer_loop(job, cancel).await;
        });
    }

    async fn timer_loop(self: Arc<Self>, job: Arc<Job>, cancel: CancellationToken) {
        let mut previous = None;
        loop {
            let now = now_ms();
            let next = match compute_following_run(&job.schedule, now, previous) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    info!(job = %job.name, "schedule has no future runs");
                    break;
                },
                Err(e) => {
                    error!(job = %job.name, error = %e, "cannot compute next run");
                    break;
                },
            };
            job.update_state(|s| s.next_run_at_ms = Some(next));
            previous = Some(next);

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(Duration::from_millis(next.saturating_sub(now))) => {},
            }

            // Runs do not watch `cancel`; `stop` waits for them via the tracker.
            let svc = Arc::clone(&self);
            let job = Arc::clone(&job);
            self.tracker.spawn(async move {
                svc.run_job(&job).await;
            });
        }
        debug!(job = %job.name, "timer loop exited");
    }

    async fn run_job(&self, job: &Job) -> RunStatus {
        if job
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(job = %job.name, "previous run still in flight; tick skipped");
            job.update_state(|s| s.skipped += 1);
            #[cfg(feature = "metrics")]
            counter!(cron_metrics::SKIPPED_TOTAL, labels::JOB => job.name.clone()).increment(1);
            return RunStatus::Skipped;
        }
        let _busy = BusyGuard(&job.busy);

        let started_at = now_ms();
        let started = Instant::now();
        let config = self.config.get();
        debug!(job = %job.name, "running job");
        #[cfg(feature = "metrics")]
        counter!(cron_metrics::EXECUTIONS_TOTAL, labels::JOB => job.name.clone()).increment(1);

        let outcome = match self.poll(job, Arc::clone(&config)).await {
            Ok(notifications) => self.fanout(job, &notifications, &config).await,
            Err(e) => Err(e),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        #[cfg(feature = "metrics")]
        histogram!(cron_metrics::EXECUTION_DURATION_SECONDS, labels::JOB => job.name.clone())
            .record(duration_ms as f64 / 1000.0);

        let (status, last_error, sent) = match outcome {
            Ok(sent) => (RunStatus::Ok, None, sent),
            Err(e) => {
                warn!(job = %job.name, error = %e, "job failed; retrying on the next tick");
                #[cfg(feature = "metrics")]
                counter!(cron_metrics::ERRORS_TOTAL, labels::JOB => job.name.clone()).increment(1);
                (RunStatus::Error, Some(e), 0)
            },
        };

        job.update_state(|s| {
            s.runs += 1;
            s.last_run_at_ms = Some(started_at);
            s.last_status = Some(status);
            s.last_error = last_error;
            s.last_duration_ms = Some(duration_ms);
            s.notifications_sent += sent as u64;
        });
        debug!(job = %job.name, status = ?status, duration_ms, sent, "job finished");
        status
    }

    /// The job's action, bounded by `scheduler.job_timeout_secs` and isolated
    /// from panics.
    async fn poll(
        &self,
        job: &Job,
        config: Arc<PluginConfig>,
    ) -> std::result::Result<Vec<Notification>, String> {
        let limit = Duration::from_secs(config.scheduler.job_timeout_secs.max(1));
        let action = AssertUnwindSafe((job.action)(config)).catch_unwind();
        match tokio::time::timeout(limit, action).await {
            Ok(Ok(Ok(notifications))) => Ok(notifications),
            Ok(Ok(Err(e))) => Err(format!("{e:#}")),
            Ok(Err(_panic)) => {
                error!(job = %job.name, "job action panicked");
                Err("job action panicked".into())
            },
            Err(_) => Err(format!("job action timed out after {}s", limit.as_secs())),
        }
    }

    /// Post every notification to every subscribed channel. A failed post is
    /// logged and does not stop the remaining posts. Returns the number of
    /// posts delivered.
    async fn fanout(
        &self,
        job: &Job,
        notifications: &[Notification],
        config: &PluginConfig,
    ) -> std::result::Result<usize, String> {
        if notifications.is_empty() {
            return Ok(0);
        }
        let subscription = self
            .subscriptions
            .load()
            .await
            .map_err(|e| format!("loading subscriptions: {e}"))?;
        if subscription.channels.is_empty() {
            debug!(job = %job.name, count = notifications.len(), "no subscribed channels");
            return Ok(0);
        }

        let limit = Duration::from_secs(config.scheduler.post_timeout_secs.max(1));
        let mut sent = 0;
        for notification in notifications {
            for channel_id in &subscription.channels {
                match tokio::time::timeout(limit, self.outbound.post_text(channel_id, &notification.text)).await {
                    Ok(Ok(())) => sent += 1,
                    Ok(Err(e)) => {
                        warn!(job = %job.name, channel_id = %channel_id, error = %e, "failed to post notification");
                    },
                    Err(_) => {
                        warn!(job = %job.name, channel_id = %channel_id, timeout_secs = limit.as_secs(), "posting notification timed out");
                    },
                }
            }
        }
        #[cfg(feature = "metrics")]
        counter!(cron_metrics::NOTIFICATIONS_SENT_TOTAL, labels::JOB => job.name.clone())
            .increment(sent as u64);
        info!(job = %job.name, notifications = notifications.len(), sent, "notifications delivered");
        Ok(sent)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use {
        ocean_common::RecordingOutbound,
        ocean_store::{InMemoryKv, KvStore},
        tokio::sync::Notify,
    };

    use super::*;

    fn action<F, Fut>(f: F) -> JobActionFn
    where
        F: Fn(Arc<PluginConfig>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<Notification>>> + Send + 'static,
    {
        Arc::new(move |cfg| f(cfg).boxed())
    }

    struct Fixture {
        scheduler: Arc<Scheduler>,
        subscriptions: Arc<SubscriptionStore>,
        outbound: Arc<RecordingOutbound>,
        config: Arc<ConfigManager>,
    }

    fn fixture() -> Fixture {
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let subscriptions = Arc::new(SubscriptionStore::new(kv));
        let outbound = Arc::new(RecordingOutbound::default());
        let config = Arc::new(ConfigManager::default());
        let scheduler = Scheduler::new(
            Arc::clone(&config),
            Arc::clone(&subscriptions),
            outbound.clone(),
        );
        Fixture {
            scheduler,
            subscriptions,
            outbound,
            config,
        }
    }

    const MINUTE: JobSchedule = JobSchedule::Every { every_ms: 60_000 };

    #[tokio::test]
    async fn one_change_fans_out_once_per_channel() {
        let f = fixture();
        f.subscriptions.add_channel("C1").await.unwrap();
        f.subscriptions.add_channel("C2").await.unwrap();
        f.scheduler
            .register(
                "watch",
                MINUTE,
                action(|_| async { Ok(vec![Notification::new("droplet web-1 is now off")]) }),
            )
            .unwrap();

        assert_eq!(f.scheduler.tick("watch").await.unwrap(), RunStatus::Ok);

        let posts = f.outbound.posts();
        assert_eq!(posts.len(), 2);
        assert!(posts.contains(&("C1".into(), "droplet web-1 is now off".into())));
        assert!(posts.contains(&("C2".into(), "droplet web-1 is now off".into())));
        let info = f.scheduler.status().job("watch").cloned().unwrap();
        assert_eq!(info.state.notifications_sent, 2);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let f = fixture();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            f.scheduler
                .register(
                    "slow",
                    MINUTE,
                    action(move |_| {
                        let entered = Arc::clone(&entered);
                        let release = Arc::clone(&release);
                        async move {
                            entered.notify_one();
                            release.notified().await;
                            Ok(vec![])
                        }
                    }),
                )
                .unwrap();
        }

        let first = {
            let scheduler = Arc::clone(&f.scheduler);
            tokio::spawn(async move { scheduler.tick("slow").await.unwrap() })
        };
        entered.notified().await;
        assert!(f.scheduler.status().job("slow").unwrap().running);

        assert_eq!(f.scheduler.tick("slow").await.unwrap(), RunStatus::Skipped);

        release.notify_one();
        assert_eq!(first.await.unwrap(), RunStatus::Ok);
        let state = f.scheduler.status().job("slow").cloned().unwrap().state;
        assert_eq!(state.runs, 1);
        assert_eq!(state.skipped, 1);
    }

    #[tokio::test]
    async fn failed_tick_does_not_block_the_next() {
        let f = fixture();
        f.subscriptions.add_channel("C1").await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        f.scheduler
            .register(
                "flaky",
                MINUTE,
                action(move |_| {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            anyhow::bail!("connection reset by peer");
                        }
                        Ok(vec![Notification::new("recovered")])
                    }
                }),
            )
            .unwrap();

        assert_eq!(f.scheduler.tick("flaky").await.unwrap(), RunStatus::Error);
        let state = f.scheduler.status().job("flaky").cloned().unwrap().state;
        assert_eq!(state.last_error.as_deref(), Some("connection reset by peer"));
        assert!(f.outbound.posts().is_empty());

        assert_eq!(f.scheduler.tick("flaky").await.unwrap(), RunStatus::Ok);
        assert_eq!(f.outbound.count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_action_is_contained() {
        let f = fixture();
        f.scheduler
            .register(
                "boom",
                MINUTE,
                action(|_| async {
                    let explode = true;
                    if explode {
                        panic!("poll exploded");
                    }
                    Ok(vec![])
                }),
            )
            .unwrap();
        assert_eq!(f.scheduler.tick("boom").await.unwrap(), RunStatus::Error);
        // Busy flag was released.
        assert_eq!(f.scheduler.tick("boom").await.unwrap(), RunStatus::Error);
        assert!(!f.scheduler.status().job("boom").unwrap().running);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_action_times_out() {
        let f = fixture();
        f.config.update(|c| c.scheduler.job_timeout_secs = 5);
        f.scheduler
            .register(
                "hang",
                MINUTE,
                action(|_| async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }),
            )
            .unwrap();
        assert_eq!(f.scheduler.tick("hang").await.unwrap(), RunStatus::Error);
        let state = f.scheduler.status().job("hang").cloned().unwrap().state;
        assert_eq!(
            state.last_error.as_deref(),
            Some("job action timed out after 5s")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_until_stopped() {
        let f = fixture();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        f.scheduler
            .register(
                "tick",
                JobSchedule::Every { every_ms: 1_000 },
                action(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(vec![]) }
                }),
            )
            .unwrap();

        f.scheduler.start();
        assert!(f.scheduler.status().running);
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        f.scheduler.stop().await;
        let fired = calls.load(Ordering::SeqCst);
        assert_eq!(fired, 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), fired);
        assert!(!f.scheduler.status().running);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_fanout() {
        let f = fixture();
        f.subscriptions.add_channel("C1").await.unwrap();
        f.subscriptions.add_channel("C2").await.unwrap();
        let entered = Arc::new(Notify::new());
        let signal = Arc::clone(&entered);
        f.scheduler
            .register(
                "fast",
                JobSchedule::Every { every_ms: 10 },
                action(move |_| {
                    let signal = Arc::clone(&signal);
                    async move {
                        signal.notify_one();
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(vec![Notification::new("change")])
                    }
                }),
            )
            .unwrap();

        f.scheduler.start();
        entered.notified().await;
        f.scheduler.stop().await;

        // Every run that started delivered to both channels.
        let count = f.outbound.count();
        assert!(count >= 2);
        assert_eq!(count % 2, 0);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_schedules() {
        let f = fixture();
        let noop = || action(|_| async { Ok(vec![]) });
        f.scheduler.register("a", MINUTE, noop()).unwrap();
        assert!(matches!(
            f.scheduler.register("a", MINUTE, noop()),
            Err(Error::DuplicateJob { .. })
        ));
        assert!(
            f.scheduler
                .register("b", JobSchedule::Every { every_ms: 0 }, noop())
                .is_err()
        );
        assert!(matches!(
            f.scheduler.tick("missing").await,
            Err(Error::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn no_subscribers_means_no_posts() {
        let f = fixture();
        f.scheduler
            .register(
                "quiet",
                MINUTE,
                action(|_| async { Ok(vec![Notification::new("x")]) }),
            )
            .unwrap();
        assert_eq!(f.scheduler.tick("quiet").await.unwrap(), RunStatus::Ok);
        assert_eq!(f.outbound.count(), 0);
    }
}
