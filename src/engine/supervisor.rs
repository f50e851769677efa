// Single-job encoder supervisor with a FIFO pending queue

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::core::SupervisorError;
use super::launcher::{EncoderProcess, Launcher};

/// The job currently owned by the encoder process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub query: String,
    pub label: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

/// A query waiting its turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingJob {
    pub id: Uuid,
    pub query: String,
    pub label: Option<String>,
    pub queued_at: DateTime<Utc>,
}

impl PendingJob {
    fn new(query: &str, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_string(),
            label,
            queued_at: Utc::now(),
        }
    }

    fn start(self) -> Job {
        Job {
            id: self.id,
            query: self.query,
            label: self.label,
            queued_at: self.queued_at,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorState {
    Idle,
    Running(Job),
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub job: Job,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub finished_at: DateTime<Utc>,
    /// Jobs still waiting when this one finished
    pub pending_after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Broadcast to every `messages()` receiver
#[derive(Debug, Clone)]
pub enum SupervisorMessage {
    JobStarted { job: Job },

    /// One raw line of encoder output
    Output {
        job_id: Uuid,
        stream: OutputStream,
        line: String,
    },

    JobFinished { outcome: JobOutcome },

    /// The process could not be waited on; the supervisor is Idle again
    JobFailed { job_id: Uuid, error: String },
}

type CompletionHook = Box<dyn Fn(&JobOutcome) + Send + Sync>;

struct Shared {
    state: Mutex<SupervisorState>,
    pending: Mutex<VecDeque<PendingJob>>,
    subscribers: Mutex<Vec<Sender<SupervisorMessage>>>,
    hook: CompletionHook,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn broadcast(&self, message: SupervisorMessage) {
        lock(&self.subscribers).retain(|tx| tx.send(message.clone()).is_ok());
    }
}

/// Runs at most one encoder at a time.
///
/// The state lock is held across the Idle check and the launch, so two racing
/// `submit` calls can never both start a process. When both locks are needed
/// the state lock is taken before the pending lock.
pub struct JobSupervisor {
    launcher: Arc<dyn Launcher>,
    shared: Arc<Shared>,
}

impl JobSupervisor {
    /// `hook` runs once after every job exits, after the state is back to Idle
    pub fn new(
        launcher: impl Launcher + 'static,
        hook: impl Fn(&JobOutcome) + Send + Sync + 'static,
    ) -> Self {
        Self {
            launcher: Arc::new(launcher),
            shared: Arc::new(Shared {
                state: Mutex::new(SupervisorState::Idle),
                pending: Mutex::new(VecDeque::new()),
                subscribers: Mutex::new(Vec::new()),
                hook: Box::new(hook),
            }),
        }
    }

    /// Start `query` now. Fails with `AlreadyRunning` instead of queueing.
    pub fn submit(&self, query: &str, label: Option<String>) -> Result<JobHandle, SupervisorError> {
        let mut state = lock(&self.shared.state);
        if let SupervisorState::Running(job) = &*state {
            return Err(SupervisorError::AlreadyRunning { job_id: job.id });
        }
        self.start(&mut state, PendingJob::new(query, label))
            .map_err(|(_, err)| err)
    }

    /// Append to the pending queue; never starts anything
    pub fn enqueue(&self, query: &str, label: Option<String>) -> Uuid {
        let job = PendingJob::new(query, label);
        let id = job.id;
        let mut pending = lock(&self.shared.pending);
        pending.push_back(job);
        debug!(job_id = %id, queued = pending.len(), "job queued");
        id
    }

    /// Start the oldest pending job.
    ///
    /// Returns `Ok(None)` when the queue is empty. While a job is running
    /// nothing is dequeued. A job that fails to launch goes back to the front.
    pub fn advance(&self) -> Result<Option<JobHandle>, SupervisorError> {
        let mut state = lock(&self.shared.state);
        if let SupervisorState::Running(job) = &*state {
            return Err(SupervisorError::AlreadyRunning { job_id: job.id });
        }

        let Some(next) = lock(&self.shared.pending).pop_front() else {
            return Ok(None);
        };

        match self.start(&mut state, next) {
            Ok(handle) => Ok(Some(handle)),
            Err((job, err)) => {
                lock(&self.shared.pending).push_front(job);
                Err(err)
            }
        }
    }

    /// Launch with the state lock held. Gives the job back on failure.
    fn start(
        &self,
        state: &mut MutexGuard<'_, SupervisorState>,
        pending: PendingJob,
    ) -> Result<JobHandle, (PendingJob, SupervisorError)> {
        let process = match self.launcher.launch(&pending.query) {
            Ok(process) => process,
            Err(source) => {
                warn!(executable = self.launcher.executable(), "encoder launch failed: {}", source);
                let err = SupervisorError::Launch {
                    executable: self.launcher.executable().to_string(),
                    source,
                };
                return Err((pending, err));
            }
        };

        let job = pending.start();
        info!(job_id = %job.id, pid = process.id(), "encode started");
        **state = SupervisorState::Running(job.clone());
        self.shared
            .broadcast(SupervisorMessage::JobStarted { job: job.clone() });

        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let watched = job.clone();
        thread::spawn(move || watch(shared, watched, process, done_tx));

        Ok(JobHandle { job, done: done_rx })
    }

    pub fn state(&self) -> SupervisorState {
        lock(&self.shared.state).clone()
    }

    pub fn is_encoding(&self) -> bool {
        matches!(*lock(&self.shared.state), SupervisorState::Running(_))
    }

    /// Snapshot of the queue, oldest first
    pub fn pending(&self) -> Vec<PendingJob> {
        lock(&self.shared.pending).iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    pub fn remove_pending(&self, id: Uuid) -> bool {
        let mut pending = lock(&self.shared.pending);
        let before = pending.len();
        pending.retain(|job| job.id != id);
        pending.len() != before
    }

    /// Empty the queue; returns how many jobs were dropped
    pub fn clear_pending(&self) -> usize {
        let mut pending = lock(&self.shared.pending);
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Receive every message sent from now on
    pub fn messages(&self) -> Receiver<SupervisorMessage> {
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.subscribers).push(tx);
        rx
    }
}

/// How long output readers may keep going once the encoder has exited.
/// A child the encoder spawned can hold the pipes open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Waits for one process and reports its exit
fn watch(
    shared: Arc<Shared>,
    job: Job,
    mut process: Box<dyn EncoderProcess>,
    done: Sender<Result<JobOutcome, SupervisorError>>,
) {
    let (drained_tx, drained_rx) = mpsc::channel::<()>();
    let readers = [
        (OutputStream::Stdout, process.take_stdout()),
        (OutputStream::Stderr, process.take_stderr()),
    ]
    .into_iter()
    .filter_map(|(stream, reader)| reader.map(|r| (stream, r)))
    .map(|(stream, reader)| {
        let shared = Arc::clone(&shared);
        let drained = drained_tx.clone();
        let job_id = job.id;
        thread::spawn(move || {
            forward_lines(&shared, job_id, stream, reader);
            let _ = drained.send(());
        })
    })
    .count();
    drop(drained_tx);

    let status = process.wait();

    // Readers still blocked after the deadline are left detached
    let deadline = Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if drained_rx.recv_timeout(remaining).is_err() {
            warn!(job_id = %job.id, "encoder output still open after exit, not waiting for it");
            break;
        }
    }

    match status {
        Ok(exit_code) => {
            *lock(&shared.state) = SupervisorState::Idle;
            let outcome = JobOutcome {
                success: exit_code == Some(0),
                exit_code,
                finished_at: Utc::now(),
                pending_after: lock(&shared.pending).len(),
                job,
            };
            info!(job_id = %outcome.job.id, ?exit_code, "encode finished");

            (shared.hook)(&outcome);
            shared.broadcast(SupervisorMessage::JobFinished {
                outcome: outcome.clone(),
            });
            let _ = done.send(Ok(outcome));
        }
        Err(e) => {
            *lock(&shared.state) = SupervisorState::Idle;
            warn!(job_id = %job.id, "failed waiting for encoder: {}", e);
            shared.broadcast(SupervisorMessage::JobFailed {
                job_id: job.id,
                error: e.to_string(),
            });
            let _ = done.send(Err(SupervisorError::Wait(e.to_string())));
        }
    }
}

fn forward_lines(shared: &Shared, job_id: Uuid, stream: OutputStream, reader: Box<dyn Read + Send>) {
    for line in BufReader::new(reader).lines().map_while(Result::ok) {
        shared.broadcast(SupervisorMessage::Output {
            job_id,
            stream,
            line,
        });
    }
}

/// Handle to a started job
#[derive(Debug)]
pub struct JobHandle {
    job: Job,
    done: Receiver<Result<JobOutcome, SupervisorError>>,
}

impl JobHandle {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Block until the job has exited and the completion hook has run
    pub fn wait_for_exit(self) -> Result<JobOutcome, SupervisorError> {
        self.done.recv().unwrap_or_else(|_| {
            Err(SupervisorError::Wait(
                "supervisor stopped watching the job".to_string(),
            ))
        })
    }
}

/// What to do with the machine once encoding is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAction {
    #[default]
    None,
    Shutdown,
    Suspend,
    Hibernate,
    Lock,
    Logoff,
}

impl PostAction {
    pub const ALL: [PostAction; 6] = [
        PostAction::None,
        PostAction::Shutdown,
        PostAction::Suspend,
        PostAction::Hibernate,
        PostAction::Lock,
        PostAction::Logoff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PostAction::None => "none",
            PostAction::Shutdown => "shutdown",
            PostAction::Suspend => "suspend",
            PostAction::Hibernate => "hibernate",
            PostAction::Lock => "lock",
            PostAction::Logoff => "logoff",
        }
    }

    /// Program and arguments that perform the action on this platform
    pub fn command(self) -> Option<(&'static str, &'static [&'static str])> {
        fn run(
            program: &'static str,
            args: &'static [&'static str],
        ) -> Option<(&'static str, &'static [&'static str])> {
            Some((program, args))
        }

        if cfg!(target_os = "windows") {
            match self {
                PostAction::None => None,
                PostAction::Shutdown => run("shutdown", &["-s", "-t", "60"]),
                PostAction::Suspend => run("rundll32.exe", &["powrprof.dll,SetSuspendState", "0,1,0"]),
                PostAction::Hibernate => run("shutdown", &["-h"]),
                PostAction::Lock => run("rundll32.exe", &["user32.dll,LockWorkStation"]),
                PostAction::Logoff => run("shutdown", &["-l"]),
            }
        } else if cfg!(target_os = "macos") {
            match self {
                PostAction::None => None,
                PostAction::Shutdown => run("shutdown", &["-h", "+1"]),
                PostAction::Suspend | PostAction::Hibernate => run("pmset", &["sleepnow"]),
                PostAction::Lock => run("pmset", &["displaysleepnow"]),
                PostAction::Logoff => run(
                    "osascript",
                    &["-e", "tell application \"System Events\" to log out"],
                ),
            }
        } else {
            match self {
                PostAction::None => None,
                PostAction::Shutdown => run("systemctl", &["poweroff"]),
                PostAction::Suspend => run("systemctl", &["suspend"]),
                PostAction::Hibernate => run("systemctl", &["hibernate"]),
                PostAction::Lock => run("loginctl", &["lock-session"]),
                PostAction::Logoff => run("loginctl", &["terminate-session", "self"]),
            }
        }
    }

    /// Run the action. Failures are logged, never returned.
    pub fn perform(self) {
        let Some((program, args)) = self.command() else {
            return;
        };
        info!(action = self.as_str(), "running post-encode action");
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(action = self.as_str(), %status, "post-encode action failed"),
            Err(e) => warn!(action = self.as_str(), "could not run post-encode action: {}", e),
        }
    }
}

impl std::fmt::Display for PostAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion hook that performs `action` once the queue has drained
pub fn post_action_hook(action: PostAction) -> impl Fn(&JobOutcome) + Send + Sync + 'static {
    move |outcome: &JobOutcome| {
        if outcome.pending_after == 0 {
            action.perform();
        } else {
            debug!(
                remaining = outcome.pending_after,
                "jobs still queued, skipping post-encode action"
            );
        }
    }
}
