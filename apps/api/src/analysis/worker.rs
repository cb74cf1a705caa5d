//! Background analysis worker — at most one job in flight.
//!
//! `start` spawns the pipeline on a tokio task and parks the receiving half of
//! a oneshot channel in the single job slot. The foreground never awaits the
//! job: clients poll, and each poll does a non-blocking `try_recv` on that
//! channel. A finished job stays visible until the next one starts.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::pipeline::validate_resume;
use crate::errors::AppError;
use crate::history::HistoryStore;
use crate::llm_client::Evaluator;
use crate::models::history::HistoryEntry;

/// Suggested delay between status polls.
pub const POLL_INTERVAL_MS: u64 = 200;

type JobOutcome = Result<HistoryEntry, String>;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Running {
        job_id: Uuid,
        file: String,
        model: String,
        started_at: DateTime<Utc>,
    },
    Completed {
        job_id: Uuid,
        entry: HistoryEntry,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
}

impl JobStatus {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobStatus::Running { job_id, .. }
            | JobStatus::Completed { job_id, .. }
            | JobStatus::Failed { job_id, .. } => *job_id,
        }
    }
}

enum Slot {
    Idle,
    Running {
        job_id: Uuid,
        file: String,
        model: String,
        started_at: DateTime<Utc>,
        receiver: oneshot::Receiver<JobOutcome>,
    },
    Finished(JobStatus),
}

#[derive(Clone)]
pub struct AnalysisWorker {
    slot: Arc<Mutex<Slot>>,
    evaluator: Arc<dyn Evaluator>,
    store: HistoryStore,
}

impl AnalysisWorker {
    pub fn new(evaluator: Arc<dyn Evaluator>, store: HistoryStore) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Idle)),
            evaluator,
            store,
        }
    }

    /// Starts analysing `path`. Fails with [`AppError::Busy`] while another
    /// job has not finished.
    pub fn start(&self, path: PathBuf, model: String) -> Result<Uuid, AppError> {
        let mut slot = self.lock();
        refresh(&mut slot);
        if let Slot::Running { job_id, .. } = &*slot {
            return Err(AppError::Busy(*job_id));
        }

        let job_id = Uuid::new_v4();
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (sender, receiver) = oneshot::channel();

        let evaluator = Arc::clone(&self.evaluator);
        let store = self.store.clone();
        let task_model = model.clone();
        tokio::spawn(async move {
            let outcome = validate_resume(&path, &task_model, evaluator.as_ref(), &store)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!("Analysis job {job_id} failed: {e}");
            }
            if sender.send(outcome).is_err() {
                warn!("Analysis job {job_id} finished but nobody is listening");
            }
        });

        info!("Started analysis job {job_id} for {file} with {model}");
        *slot = Slot::Running {
            job_id,
            file,
            model,
            started_at: Utc::now(),
            receiver,
        };
        Ok(job_id)
    }

    /// Status of `job_id`, if it is the job currently held in the slot.
    pub fn poll(&self, job_id: Uuid) -> Option<JobStatus> {
        self.current().filter(|status| status.job_id() == job_id)
    }

    /// Status of whatever job is in the slot.
    pub fn current(&self) -> Option<JobStatus> {
        let mut slot = self.lock();
        refresh(&mut slot);
        match &*slot {
            Slot::Idle => None,
            Slot::Running {
                job_id,
                file,
                model,
                started_at,
                ..
            } => Some(JobStatus::Running {
                job_id: *job_id,
                file: file.clone(),
                model: model.clone(),
                started_at: *started_at,
            }),
            Slot::Finished(status) => Some(status.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Moves a running job to `Finished` once its result has been handed over.
fn refresh(slot: &mut Slot) {
    let finished = match slot {
        Slot::Running {
            job_id, receiver, ..
        } => {
            let job_id = *job_id;
            match receiver.try_recv() {
                Ok(Ok(entry)) => JobStatus::Completed { job_id, entry },
                Ok(Err(error)) => JobStatus::Failed { job_id, error },
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Closed) => JobStatus::Failed {
                    job_id,
                    error: "analysis task ended without a result".to_string(),
                },
            }
        }
        _ => return,
    };
    *slot = Slot::Finished(finished);
}
