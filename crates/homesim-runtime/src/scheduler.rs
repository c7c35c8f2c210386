//! Virtual-time task scheduler
//!
//! Tasks are ordered by next virtual fire time with task-id tie-breaking for
//! determinism. A scheduling pass pops everything due at `clock.now()`,
//! executes refresh-context tasks before entity ticks (the one required
//! ordering edge), runs tasks of the same kind concurrently, and reinserts
//! recurring tasks at `fire_time + interval` so bursty catch-up after a
//! pause cannot introduce drift. Missed occurrences of a recurring task are
//! collapsed into a single execution; one-shot tasks always run exactly once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::SimulationClock;

/// Maximum wall-clock wait between scheduling passes, so speed/pause changes
/// are noticed promptly.
const MAX_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Unique identifier of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Kind of a scheduled task; doubles as the intra-pass execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Recompute ambient context; runs before entity ticks in the same pass
    RefreshContext,
    /// Advance behavior engines for a batch of entities
    TickEntities,
    /// Periodic bookkeeping (stats, log rollups)
    Housekeeping,
}

/// Boxed future returned by a task callback
pub type TaskFuture =
    Pin<Box<dyn Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send>>;

type TaskFn = Arc<dyn Fn(DateTime<Utc>) -> TaskFuture + Send + Sync>;

struct Task {
    id: TaskId,
    kind: TaskKind,
    interval: Option<chrono::Duration>,
    callback: TaskFn,
}

struct QueuedTask {
    fire_at: DateTime<Utc>,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.task.id == other.task.id
    }
}
impl Eq for QueuedTask {}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Ties on fire time are broken by task id for determinism
        (self.fire_at, self.task.id).cmp(&(other.fire_at, other.task.id))
    }
}

struct SchedulerState {
    queue: BinaryHeap<Reverse<QueuedTask>>,
    cancelled: HashSet<TaskId>,
}

/// Priority-queue scheduler driven by the virtual clock
pub struct Scheduler {
    clock: Arc<SimulationClock>,
    state: Mutex<SchedulerState>,
    next_task_id: AtomicU64,
    executed: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(clock: Arc<SimulationClock>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            clock,
            state: Mutex::new(SchedulerState {
                queue: BinaryHeap::new(),
                cancelled: HashSet::new(),
            }),
            next_task_id: AtomicU64::new(1),
            executed: AtomicU64::new(0),
            shutdown_tx,
        }
    }

    /// Schedule a one-shot task at a specific virtual time
    pub fn schedule_at<F>(&self, fire_at: DateTime<Utc>, kind: TaskKind, callback: F) -> TaskId
    where
        F: Fn(DateTime<Utc>) -> TaskFuture + Send + Sync + 'static,
    {
        self.push(fire_at, kind, None, Arc::new(callback))
    }

    /// Schedule a recurring task with a fixed virtual-time interval
    ///
    /// The first execution happens one interval after the current virtual
    /// time.
    pub fn schedule_interval<F>(
        &self,
        interval: chrono::Duration,
        kind: TaskKind,
        callback: F,
    ) -> TaskId
    where
        F: Fn(DateTime<Utc>) -> TaskFuture + Send + Sync + 'static,
    {
        let fire_at = self.clock.now() + interval;
        self.push(fire_at, kind, Some(interval), Arc::new(callback))
    }

    fn push(
        &self,
        fire_at: DateTime<Utc>,
        kind: TaskKind,
        interval: Option<chrono::Duration>,
        callback: TaskFn,
    ) -> TaskId {
        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::SeqCst));
        let task = Task {
            id,
            kind,
            interval,
            callback,
        };
        let mut state = self.state.lock().unwrap();
        state.queue.push(Reverse(QueuedTask { fire_at, task }));
        trace!(task = id.0, ?kind, %fire_at, "Task scheduled");
        id
    }

    /// Cancel a task; returns false if it was not pending
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.lock().unwrap();
        let pending = state
            .queue
            .iter()
            .any(|Reverse(q)| q.task.id == id && !state.cancelled.contains(&id));
        if pending {
            state.cancelled.insert(id);
        }
        pending
    }

    /// Number of pending (non-cancelled) tasks
    pub fn pending_tasks(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .queue
            .iter()
            .filter(|Reverse(q)| !state.cancelled.contains(&q.task.id))
            .count()
    }

    /// Total task executions since creation
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Execute every task due at the current virtual time
    ///
    /// Within the pass, due tasks are grouped by kind: RefreshContext tasks
    /// complete before TickEntities tasks, which complete before
    /// Housekeeping. Tasks of one kind run concurrently and are joined
    /// before the pass moves on, so a task never overlaps its own next
    /// invocation. Returns the number of tasks executed.
    pub async fn run_pending(&self) -> usize {
        let now = self.clock.now();

        // Collect everything due, dropping cancelled entries
        let mut due: Vec<QueuedTask> = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            while let Some(Reverse(head)) = state.queue.peek() {
                if head.fire_at > now {
                    break;
                }
                let Reverse(queued) = state.queue.pop().expect("peeked entry exists");
                if state.cancelled.remove(&queued.task.id) {
                    continue;
                }
                due.push(queued);
            }
        }
        if due.is_empty() {
            return 0;
        }

        // Kind order first, then fire time, then id
        due.sort_by_key(|q| (q.task.kind, q.fire_at, q.task.id));

        let mut executed = 0;
        let mut idx = 0;
        while idx < due.len() {
            let kind = due[idx].task.kind;
            let group_end = due[idx..]
                .iter()
                .position(|q| q.task.kind != kind)
                .map(|p| idx + p)
                .unwrap_or(due.len());

            let group = &due[idx..group_end];
            let results = join_all(group.iter().map(|q| {
                let cb = Arc::clone(&q.task.callback);
                let fire_at = q.fire_at;
                async move { (cb)(fire_at).await }
            }))
            .await;

            for (queued, result) in group.iter().zip(results) {
                executed += 1;
                if let Err(err) = result {
                    // Failures are isolated: log and reschedule normally
                    warn!(task = queued.task.id.0, error = %err, "Task execution failed");
                }
            }
            idx = group_end;
        }
        self.executed.fetch_add(executed as u64, Ordering::Relaxed);

        // Reinsert recurring tasks on their original phase. Occurrences that
        // fell behind by more than one interval are collapsed.
        let mut state = self.state.lock().unwrap();
        for queued in due {
            let QueuedTask { fire_at, task } = queued;
            if state.cancelled.remove(&task.id) {
                continue;
            }
            if let Some(interval) = task.interval {
                let mut next = fire_at + interval;
                if next <= now {
                    let behind_ms = (now - fire_at).num_milliseconds().max(0);
                    let interval_ms = interval.num_milliseconds().max(1);
                    let missed = behind_ms / interval_ms;
                    debug!(
                        task = task.id.0,
                        missed, "Collapsing missed periodic occurrences"
                    );
                    // Millisecond arithmetic: the missed count can exceed i32
                    next = fire_at + chrono::Duration::milliseconds(interval_ms * (missed + 1));
                }
                state.queue.push(Reverse(QueuedTask { fire_at: next, task }));
            }
        }
        executed
    }

    /// Request the run loop to stop admitting new passes
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the scheduling loop until shutdown is requested
    ///
    /// In-flight tasks of the current pass complete before the loop exits.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        debug!("Scheduler loop started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            self.run_pending().await;

            let wait = self.next_wall_wait();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
        debug!("Scheduler loop stopped");
    }

    /// Wall-clock wait until the next task is due, capped so that clock
    /// adjustments are noticed.
    fn next_wall_wait(&self) -> Duration {
        let next_fire = {
            let state = self.state.lock().unwrap();
            state.queue.peek().map(|Reverse(q)| q.fire_at)
        };
        match next_fire {
            Some(at) => self
                .clock
                .wall_until(at)
                .map(|d| d.min(MAX_IDLE_WAIT))
                .unwrap_or(MAX_IDLE_WAIT),
            None => MAX_IDLE_WAIT,
        }
    }
}
