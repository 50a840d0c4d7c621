use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;

type DbJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Job(DbJob),
    Shutdown,
}

/// Where the worker thread should open its connection.
enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            Location::File(path) => Connection::open(path),
            Location::Memory => Connection::open_in_memory(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else { return };

        if let Err(err) = self.jobs.send(Message::Shutdown) {
            error!("Failed to send shutdown to history DB thread: {err}");
        }
        if let Err(join_err) = handle.join() {
            error!("Failed to join history DB thread: {join_err:?}");
        }
    }
}

/// SQLite-backed session history.
///
/// One connection lives on a dedicated thread. Queries travel there as
/// closures and the async caller awaits a oneshot reply, so the timer's
/// runtime never blocks on disk.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let worker = spawn_worker(Location::File(db_path))?;
        Ok(Self {
            worker: Arc::new(worker),
        })
    }

    /// A private database that disappears with the last clone.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            worker: Arc::new(spawn_worker(Location::Memory)?),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: DbJob = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("History DB caller went away before the reply");
            }
        });

        self.worker
            .jobs
            .send(Message::Job(job))
            .map_err(|err| anyhow!("failed to reach history DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("history DB thread terminated unexpectedly"))?
    }
}

fn spawn_worker(location: Location) -> Result<Worker> {
    let (jobs_tx, jobs_rx) = mpsc::channel::<Message>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
    let label = location.describe();

    let thread = thread::Builder::new()
        .name("attention-db".into())
        .spawn(move || {
            let mut conn = match location.open() {
                Ok(conn) => conn,
                Err(err) => {
                    let _ = ready_tx.send(Err(anyhow::Error::new(err)
                        .context("failed to open SQLite database")));
                    return;
                }
            };

            if let Location::File(_) = location {
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
            }

            let migrated = run_migrations(&mut conn).context("failed to run database migrations");
            if ready_tx.send(migrated).is_err() {
                return;
            }

            while let Ok(Message::Job(job)) = jobs_rx.recv() {
                job(&mut conn);
            }
            info!("History DB thread shutting down");
        })
        .context("failed to spawn history DB thread")?;

    ready_rx
        .recv()
        .context("history DB thread exited before signaling readiness")??;
    info!("History database ready at {label}");

    Ok(Worker {
        jobs: jobs_tx,
        thread: Mutex::new(Some(thread)),
    })
}
