use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ebpf::CounterProgram;
use crate::error::FatalError;
use crate::iface::{InterfaceFilter, InterfaceSource};
use crate::worker::{Worker, WorkerReport};

/// Starts one worker per interface and waits for them to finish.
pub struct Supervisor<P, S> {
    program: Arc<P>,
    source: Arc<S>,
    filter: InterfaceFilter,
    poll_interval: Duration,
}

impl<P, S> Supervisor<P, S>
where
    P: CounterProgram,
    S: InterfaceSource,
{
    pub fn new(program: P, source: S, filter: InterfaceFilter, poll_interval: Duration) -> Self {
        Self {
            program: Arc::new(program),
            source: Arc::new(source),
            filter,
            poll_interval,
        }
    }

    /// Count on every selected interface until `shutdown` is cancelled.
    ///
    /// The first fatal worker error cancels `shutdown`, so every other
    /// worker detaches and unloads before the error is returned. If the
    /// interfaces cannot be listed, nothing is started and `Ok` is
    /// returned.
    pub async fn run(self, shutdown: CancellationToken) -> Result<Vec<WorkerReport>, FatalError> {
        let ifaces = match self.source.list() {
            Ok(ifaces) => self.filter.apply(ifaces),
            Err(e) => {
                log::error!("{e}");
                return Ok(Vec::new());
            }
        };

        log::info!("Found [{}] interfaces", ifaces.len());
        if ifaces.is_empty() {
            return Ok(Vec::new());
        }

        let mut workers = JoinSet::new();
        for iface in ifaces {
            let worker = Worker::new(
                self.program.clone(),
                self.source.clone(),
                iface,
                self.poll_interval,
                shutdown.clone(),
            );
            workers.spawn(worker.run());
        }

        let mut reports = Vec::new();
        let mut fatal = None;
        while let Some(joined) = workers.join_next().await {
            match joined.map_err(FatalError::from).and_then(|outcome| outcome) {
                Ok(report) => reports.push(report),
                Err(e) if fatal.is_none() => {
                    log::error!("{e}");
                    log::info!(
                        "Stopping all workers after failure on {}",
                        e.interface().unwrap_or("a worker")
                    );
                    shutdown.cancel();
                    fatal = Some(e);
                }
                Err(e) => log::debug!("Further failure during shutdown: {e}"),
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}
