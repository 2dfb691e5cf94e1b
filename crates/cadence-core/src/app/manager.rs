//! InvocationManager - 1 タスク分のスケジューリングループ
//!
//! # フロー
//! 1. scheduled の先頭を peek、期限前なら次の run_at まで sleep
//! 2. 期限が来たら overlap 上限を確認し、dequeue して running に移す
//! 3. 実行は別の tokio task（遅いタスクがループを止めない）
//! 4. Scheduled の実行を取り出したら次回分を tail に積む
//! 5. リトライは自分より後の run_at を持つ最初の要素の前に戻す
//!
//! sleep は stop 要求・実行完了・手動トリガで起こされます。

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use super::status::ManagerStatus;
use crate::domain::{
    Decision, Interval, Invocation, InvocationReason, ManagerState, RetryDecider, StatusSummary,
    TaskConfig, TaskError,
};
use crate::error::SchedulerError;
use crate::ports::{Clock, StatusReceiver, StatusUpdates, TaskLogic};
use crate::queue::InvocationQueue;

/// How long a finished invocation waits for its status updates to be delivered.
const STATUS_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A validated task with its resolved handles.
pub struct ScheduledTask {
    pub config: TaskConfig,
    pub interval: Interval,
    pub logic: Arc<dyn TaskLogic>,
    pub receiver: Option<Arc<dyn StatusReceiver>>,
    pub retry: RetryDecider,
}

impl ScheduledTask {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn full_name(&self) -> String {
        self.config.full_name()
    }
}

/// Owns one task's lifecycle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InvocationManager {
    inner: Arc<Inner>,
}

struct Inner {
    task: ScheduledTask,
    scheduled: InvocationQueue,
    running: InvocationQueue,
    state: watch::Sender<ManagerState>,
    counter: AtomicU64,
    /// Completions and manual triggers.
    wake: Notify,
    clock: Arc<dyn Clock>,
    span: Span,
}

impl Inner {
    fn next_invocation(&self, run_at: DateTime<Utc>, reason: InvocationReason) -> Invocation {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        Invocation::new(counter, run_at, self.task.config.max_attempts(), reason)
    }

    fn state(&self) -> ManagerState {
        *self.state.borrow()
    }
}

impl InvocationManager {
    pub fn new(task: ScheduledTask, clock: Arc<dyn Clock>) -> Self {
        let span = info_span!("task", task_id = %task.id());
        let (state, _) = watch::channel(ManagerState::Stopped);
        Self {
            inner: Arc::new(Inner {
                task,
                scheduled: InvocationQueue::new(),
                running: InvocationQueue::new(),
                state,
                counter: AtomicU64::new(1),
                wake: Notify::new(),
                clock,
                span,
            }),
        }
    }

    pub fn task(&self) -> &ScheduledTask {
        &self.inner.task
    }

    pub fn task_id(&self) -> &str {
        self.inner.task.id()
    }

    pub fn state(&self) -> ManagerState {
        self.inner.state()
    }

    /// Schedule the first invocation, then run the loop until stopped.
    ///
    /// Only valid from `Stopped`; otherwise returns immediately.
    pub async fn start(&self) {
        if self.begin() {
            self.run().await;
        }
    }

    /// Synchronous half of [`start`](Self::start): `Stopped → Starting →
    /// Running` and the first invocation. `false` if the manager was not stopped.
    ///
    /// `allow_access` calls this before spawning [`run`](Self::run), so managers
    /// are `Running` as soon as it returns.
    pub fn begin(&self) -> bool {
        let inner = &self.inner;
        let _guard = inner.span.enter();
        let entered = inner.state.send_if_modified(|state| {
            if *state == ManagerState::Stopped {
                *state = ManagerState::Starting;
                true
            } else {
                false
            }
        });
        if !entered {
            warn!(state = %inner.state(), "start ignored: manager is not stopped");
            return false;
        }

        // leftovers from a previous run are stale
        while inner.scheduled.dequeue().is_some() {}

        if inner.task.config.disabled {
            info!("task is disabled; waiting for manual triggers only");
        } else {
            let now = inner.clock.now();
            let run_at = inner.task.interval.first_run(now);
            let first = inner.next_invocation(run_at, InvocationReason::Scheduled);
            debug!(counter = first.counter, run_at = %first.run_at, "first invocation scheduled");
            inner.scheduled.enqueue_at_tail(first);
        }

        inner.state.send_if_modified(|state| {
            if *state == ManagerState::Starting {
                *state = ManagerState::Running;
                true
            } else {
                false
            }
        });
        info!(name = %inner.task.full_name(), interval = %inner.task.interval, "task manager started");
        true
    }

    /// The scheduling loop. Returns once the manager is stopping or stopped.
    pub async fn run(&self) {
        let span = self.inner.span.clone();
        async {
            self.run_loop().await;
            info!("scheduling loop exited");
        }
        .instrument(span)
        .await
    }

    async fn run_loop(&self) {
        let inner = &self.inner;
        let limit = inner.task.config.overlap_limit() as usize;
        let mut state_rx = inner.state.subscribe();
        // counter of the invocation we last warned about, so a long deferral warns once
        let mut deferred: Option<u64> = None;

        loop {
            if state_rx.borrow_and_update().is_winding_down() {
                break;
            }

            let now = inner.clock.now();
            let sleep_for = match inner.scheduled.peek_head() {
                None => None,
                Some(head) if !head.is_due(now) => Some((head.run_at - now).to_std().unwrap_or_default()),
                Some(head) if inner.running.size() >= limit => {
                    if deferred != Some(head.counter) {
                        deferred = Some(head.counter);
                        if !inner.task.config.no_warn_on_overlap {
                            warn!(
                                counter = head.counter,
                                running = inner.running.size(),
                                max_overlapping = limit,
                                "invocation due but overlap limit reached; deferring"
                            );
                        }
                    }
                    // a completion will wake us
                    None
                }
                Some(head) => {
                    if let Some(invocation) = inner.scheduled.dequeue_if_head(head.counter) {
                        self.dispatch(invocation, now);
                    }
                    continue;
                }
            };

            tokio::select! {
                _ = state_rx.changed() => {}
                _ = inner.wake.notified() => {}
                _ = sleep_or_pending(sleep_for) => {}
            }
        }
    }

    fn dispatch(&self, mut invocation: Invocation, now: DateTime<Utc>) {
        let inner = &self.inner;
        let reason = invocation.reason;
        let run_at = invocation.run_at;

        if inner.state().is_dispatching() {
            invocation.started_at = Some(now);
            inner.running.enqueue_at_tail(invocation.clone());
            debug!(
                counter = invocation.counter,
                attempt = invocation.attempt,
                reason = ?invocation.reason,
                "launching invocation"
            );
            let manager = self.clone();
            tokio::spawn(
                async move { manager.execute(invocation).await }.instrument(inner.span.clone()),
            );
        }

        if reason == InvocationReason::Scheduled && !inner.state().is_winding_down() {
            let next_run = inner.task.interval.next_after(run_at, now);
            let next = inner.next_invocation(next_run, InvocationReason::Scheduled);
            debug!(counter = next.counter, run_at = %next.run_at, "next invocation scheduled");
            inner.scheduled.enqueue_at_tail(next);
        }
    }

    async fn execute(&self, invocation: Invocation) {
        let inner = &self.inner;
        let started_at = invocation.started_at.unwrap_or_else(|| inner.clock.now());

        let (status, forwarder) = match &inner.task.receiver {
            Some(receiver) => {
                let (updates, mut rx) = StatusUpdates::channel();
                let summary = StatusSummary {
                    task_name: inner.task.config.name.clone(),
                    task_id: inner.task.id().to_string(),
                    started_at,
                    invocation_count: invocation.counter,
                    attempt: invocation.attempt,
                };
                let receiver = Arc::clone(receiver);
                let forwarder = tokio::spawn(async move {
                    while let Some(update) = rx.recv().await {
                        receiver.receive(&summary, &update);
                    }
                });
                (Some(updates), Some(forwarder))
            }
            None => (None, None),
        };

        // Run the logic in its own task so a panic is reported instead of
        // leaving the invocation stuck in `running`.
        let logic = Arc::clone(&inner.task.logic);
        let result = match tokio::spawn(async move { logic.execute_task(status).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(TaskError::terminal(format!("task logic panicked: {join_err}"))),
        };

        if let Some(forwarder) = forwarder {
            if tokio::time::timeout(STATUS_DRAIN_TIMEOUT, forwarder).await.is_err() {
                debug!(counter = invocation.counter, "status sender still held after completion");
            }
        }

        match inner.task.retry.decide(&invocation, &result, inner.clock.now()) {
            Decision::Done => {
                debug!(counter = invocation.counter, attempt = invocation.attempt, "invocation succeeded");
            }
            Decision::Retry { next } => {
                let error = result.as_ref().err().map(ToString::to_string).unwrap_or_default();
                if inner.state().is_winding_down() {
                    warn!(
                        counter = next.counter,
                        attempt = next.attempt,
                        max_attempts = next.max_attempts,
                        %error,
                        "invocation failed while stopping; retry discarded"
                    );
                } else {
                    warn!(
                        counter = next.counter,
                        attempt = next.attempt,
                        max_attempts = next.max_attempts,
                        run_at = %next.run_at,
                        %error,
                        "invocation failed; retry requeued"
                    );
                    inner.scheduled.enqueue_before_later(next);
                }
            }
            Decision::Abandon { reason } => {
                error!(
                    counter = invocation.counter,
                    attempt = invocation.attempt,
                    max_attempts = invocation.max_attempts,
                    %reason,
                    "invocation abandoned"
                );
            }
        }

        inner.running.remove(invocation.counter);
        inner.wake.notify_one();
    }

    /// Queue a manual invocation ahead of scheduled work, due immediately.
    pub fn trigger(&self) -> Result<Invocation, SchedulerError> {
        let inner = &self.inner;
        let state = inner.state();
        if state != ManagerState::Running {
            return Err(SchedulerError::InvalidState(format!(
                "task '{}' is {state}; manual triggers need a running manager",
                inner.task.id()
            )));
        }
        let invocation = inner.next_invocation(inner.clock.now(), InvocationReason::Manual);
        info!(task_id = %inner.task.id(), counter = invocation.counter, "manual trigger queued");
        inner.scheduled.enqueue_at_head(invocation.clone());
        inner.wake.notify_one();
        Ok(invocation)
    }

    /// Stop dispatching new work. In-flight executions are left to finish.
    pub fn prepare_to_stop(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == ManagerState::Stopped || *state == ManagerState::Stopping {
                false
            } else {
                *state = ManagerState::Stopping;
                true
            }
        });
        if changed {
            debug!(task_id = %self.task_id(), "preparing to stop");
        }
    }

    /// `Ok` once nothing is running; otherwise the reason.
    pub fn ready_to_stop(&self) -> Result<(), String> {
        match self.inner.running.size() {
            0 => Ok(()),
            n => Err(format!("{} has {n} invocation(s) still running", self.inner.task.full_name())),
        }
    }

    pub fn stop(&self) {
        let in_flight = self.inner.running.size();
        if in_flight > 0 {
            warn!(task_id = %self.task_id(), in_flight, "stopping with invocations still running");
        }
        self.inner.state.send_replace(ManagerState::Stopped);
        info!(task_id = %self.task_id(), "task manager stopped");
    }

    pub fn status(&self) -> ManagerStatus {
        let inner = &self.inner;
        ManagerStatus {
            task_id: inner.task.id().to_string(),
            full_name: inner.task.full_name(),
            state: inner.state(),
            disabled: inner.task.config.disabled,
            scheduled: inner.scheduled.contents(),
            running: inner.running.contents(),
        }
    }
}

fn sleep_or_pending(duration: Option<Duration>) -> impl Future<Output = ()> {
    async move {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskError;
    use crate::ports::TokioClock;
    use crate::recurrence::parse_interval_at;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    /// Records every call; fails with the given error kind until `fail_times` runs out.
    #[derive(Default)]
    struct Recorder {
        calls: AtomicU32,
        fail_times: u32,
        retryable: bool,
        hold: Option<Duration>,
    }

    #[async_trait]
    impl TaskLogic for Recorder {
        async fn execute_task(&self, status: Option<StatusUpdates>) -> Result<(), TaskError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(status) = status {
                status.send(format!("call {n}"));
            }
            if let Some(hold) = self.hold {
                tokio::time::sleep(hold).await;
            }
            if n <= self.fail_times {
                return Err(if self.retryable {
                    TaskError::allow_retry(format!("call {n} failed"))
                } else {
                    TaskError::terminal(format!("call {n} failed"))
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<(u64, String)>>);

    impl StatusReceiver for Collect {
        fn receive(&self, summary: &StatusSummary, update: &str) {
            self.0
                .lock()
                .unwrap()
                .push((summary.invocation_count, update.to_string()));
        }
    }

    fn manager(
        config: TaskConfig,
        logic: Arc<dyn TaskLogic>,
        receiver: Option<Arc<dyn StatusReceiver>>,
        retry_every: Duration,
    ) -> InvocationManager {
        let clock = Arc::new(TokioClock::new());
        let interval = parse_interval_at(&config.every, clock.now()).unwrap();
        let task = ScheduledTask {
            config,
            interval,
            logic,
            receiver,
            retry: RetryDecider::new(retry_every),
        };
        InvocationManager::new(task, clock)
    }

    fn config(every: &str) -> TaskConfig {
        TaskConfig {
            id: "t".to_string(),
            component: "logic".to_string(),
            every: every.to_string(),
            ..TaskConfig::default()
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_every_frequency() {
        let logic = Arc::new(Recorder::default());
        let m = manager(config("10 seconds"), logic.clone(), None, Duration::ZERO);
        let handle = tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        tokio::time::sleep(Duration::from_millis(35_500)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 3);
        assert_eq!(m.state(), ManagerState::Running);

        // 次回分が常に積まれている
        let status = m.status();
        assert_eq!(status.scheduled.len(), 1);
        assert_eq!(status.scheduled[0].reason, InvocationReason::Scheduled);

        m.prepare_to_stop();
        assert!(m.ready_to_stop().is_ok());
        m.stop();
        handle.await.unwrap();
        assert_eq!(m.state(), ManagerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_are_retried_until_exhausted() {
        let logic = Arc::new(Recorder {
            fail_times: u32::MAX,
            retryable: true,
            ..Recorder::default()
        });
        let mut cfg = config("1 hour");
        cfg.max_retries = 2;
        let m = manager(cfg, logic.clone(), None, Duration::from_secs(1));
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });
        settle().await;

        m.trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 3);
        assert!(m.ready_to_stop().is_ok());
        // 断念したので retry は残らない
        assert!(m.status().scheduled.iter().all(|i| i.reason == InvocationReason::Scheduled));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_is_not_retried() {
        let logic = Arc::new(Recorder {
            fail_times: 1,
            retryable: false,
            ..Recorder::default()
        });
        let mut cfg = config("1 hour");
        cfg.max_retries = 5;
        let m = manager(cfg, logic.clone(), None, Duration::from_secs(1));
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });
        settle().await;

        m.trigger().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlap_limit_defers_due_invocations() {
        let logic = Arc::new(Recorder {
            hold: Some(Duration::from_secs(25)),
            ..Recorder::default()
        });
        let mut cfg = config("10 seconds");
        cfg.no_warn_on_overlap = true;
        let m = manager(cfg, logic.clone(), None, Duration::ZERO);
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        // 10s: 1 回目開始（35s まで走る）。20s, 30s の分は後回し
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);
        assert_eq!(m.status().running.len(), 1);
        assert!(m.ready_to_stop().is_err());

        // 35s で 1 回目が終わり、待っていた分がすぐ走る
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_executions_up_to_limit() {
        let logic = Arc::new(Recorder {
            hold: Some(Duration::from_secs(100)),
            ..Recorder::default()
        });
        let mut cfg = config("1 second");
        cfg.max_overlapping = Some(3);
        let m = manager(cfg, logic.clone(), None, Duration::ZERO);
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(m.status().running.len(), 3);
        assert_eq!(logic.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_updates_reach_receiver() {
        let logic = Arc::new(Recorder::default());
        let receiver = Arc::new(Collect::default());
        let m = manager(config("1 hour"), logic, Some(receiver.clone()), Duration::ZERO);
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });
        settle().await;

        let inv = m.trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = receiver.0.lock().unwrap().clone();
        assert_eq!(seen, vec![(inv.counter, "call 1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_task_only_runs_when_triggered() {
        let logic = Arc::new(Recorder::default());
        let mut cfg = config("1 second");
        cfg.disabled = true;
        let m = manager(cfg, logic.clone(), None, Duration::ZERO);
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 0);
        assert!(m.status().scheduled.is_empty());

        m.trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prepare_to_stop_halts_dispatch_but_not_in_flight_work() {
        let logic = Arc::new(Recorder {
            hold: Some(Duration::from_secs(3)),
            ..Recorder::default()
        });
        let m = manager(config("2 seconds"), logic.clone(), None, Duration::ZERO);
        let handle = tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);

        m.prepare_to_stop();
        handle.await.unwrap();
        assert_eq!(m.state(), ManagerState::Stopping);
        assert!(m.ready_to_stop().is_err());
        assert!(m.trigger().is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);
        assert!(m.ready_to_stop().is_ok());
        m.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_requested_while_stopping_is_discarded() {
        let logic = Arc::new(Recorder {
            fail_times: u32::MAX,
            retryable: true,
            hold: Some(Duration::from_secs(2)),
            ..Recorder::default()
        });
        let mut cfg = config("1 hour");
        cfg.max_retries = 2;
        let m = manager(cfg, logic.clone(), None, Duration::from_secs(1));
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });
        settle().await;

        m.trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        m.prepare_to_stop();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(logic.calls.load(Ordering::SeqCst), 1);
        assert!(m.ready_to_stop().is_ok());
        assert!(m.status().scheduled.iter().all(|i| i.reason != InvocationReason::Retry));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_retry_does_not_hold_back_due_scheduled_work() {
        let logic = Arc::new(Recorder {
            fail_times: u32::MAX,
            retryable: true,
            ..Recorder::default()
        });
        let mut cfg = config("1 second");
        cfg.max_retries = 1;
        // リトライは次の 2 回分の枠より後
        let m = manager(cfg, logic.clone(), None, Duration::from_millis(2_500));
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });

        tokio::time::sleep(Duration::from_millis(2_200)).await;
        let status = m.status();
        // 1s: #1 失敗 → retry 3.5s、2s: #2 は待たずに実行済み
        let run_ats: Vec<_> = status.scheduled.iter().map(|i| (i.reason, i.run_at)).collect();
        assert_eq!(run_ats.len(), 3);
        assert_eq!(run_ats[0].0, InvocationReason::Scheduled);
        assert!(run_ats.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(logic.calls.load(Ordering::SeqCst), 2);

        // 10.5s まで: scheduled 10 回 + 完了済みの retry
        tokio::time::sleep(Duration::from_millis(8_300)).await;
        let calls = logic.calls.load(Ordering::SeqCst);
        assert!(calls >= 10 + 7, "scheduled slots were skipped: {calls} calls");
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_logic_is_contained() {
        struct Panics;

        #[async_trait]
        impl TaskLogic for Panics {
            async fn execute_task(&self, _status: Option<StatusUpdates>) -> Result<(), TaskError> {
                panic!("boom");
            }
        }

        let m = manager(config("1 hour"), Arc::new(Panics), None, Duration::ZERO);
        tokio::spawn({
            let m = m.clone();
            async move { m.start().await }
        });
        settle().await;

        m.trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(m.ready_to_stop().is_ok());
    }
}
