use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ebpf::session::Session;
use crate::ebpf::{CounterProgram, ProgramInstance};
use crate::error::{BoxError, FatalError};
use crate::iface::{Interface, InterfaceSource};

/// What a worker saw before it was told to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub interface: String,
    pub ticks: u64,
    pub last_count: u64,
    /// Reads that came back lower than the one before.
    pub regressions: u64,
}

impl WorkerReport {
    fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            ticks: 0,
            last_count: 0,
            regressions: 0,
        }
    }

    fn record(&mut self, count: u64) {
        if count < self.last_count {
            log::warn!(
                "[{}] Counter went backwards: {} -> {}",
                self.interface,
                self.last_count,
                count
            );
            self.regressions += 1;
        }
        self.ticks += 1;
        self.last_count = count;
    }
}

/// Log line for one poll tick. Idle ticks stay silent.
pub fn tick_message(iface: &str, count: u64) -> Option<String> {
    (count > 0).then(|| format!("[{iface}] Received {count} packets"))
}

/// Log line for leaving the poll loop. The token may have been cancelled
/// by an interrupt or by a failing sibling, so it names neither.
pub fn shutdown_message(iface: &str) -> String {
    format!("[{iface}] Shutting down..")
}

/// Counts packets on a single interface until shutdown.
///
/// Owns its own program instance and attachment; nothing is shared with
/// other workers except the shutdown token.
pub struct Worker<P, S> {
    program: Arc<P>,
    source: Arc<S>,
    iface: Interface,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl<P, S> Worker<P, S>
where
    P: CounterProgram,
    S: InterfaceSource,
{
    pub fn new(
        program: Arc<P>,
        source: Arc<S>,
        iface: Interface,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            program,
            source,
            iface,
            poll_interval,
            shutdown,
        }
    }

    /// Run the worker to completion. A fatal error cancels the shared
    /// shutdown token so sibling workers tear down too.
    pub async fn run(self) -> Result<WorkerReport, FatalError> {
        let result = self.lifecycle().await;
        if result.is_err() {
            self.shutdown.cancel();
        }
        result
    }

    async fn lifecycle(&self) -> Result<WorkerReport, FatalError> {
        let name = self.iface.name.as_str();
        if self.shutdown.is_cancelled() {
            log::debug!("[{name}] Shutdown already started, not loading");
            return Ok(WorkerReport::new(name));
        }

        log::info!("[{name}] Run for interface");
        log::debug!("[{name}] Loading");
        let program = self.program.clone();
        let instance = tokio::task::spawn_blocking(move || program.load())
            .await
            .map_err(BoxError::from)
            .and_then(|loaded| loaded)
            .map_err(|source| FatalError::Load {
                iface: name.to_string(),
                source,
            })?;
        let mut session = Session::new(name, instance);
        if self.shutdown.is_cancelled() {
            log::info!("{}", shutdown_message(name));
            return Ok(WorkerReport::new(name));
        }

        let if_index = self
            .source
            .index_of(name)
            .map_err(|source| FatalError::Lookup {
                iface: name.to_string(),
                source,
            })?;
        if if_index != self.iface.index {
            log::debug!(
                "[{name}] Index changed since enumeration: {} -> {if_index}",
                self.iface.index
            );
        }

        session.attach(if_index).map_err(|source| FatalError::Attach {
            iface: name.to_string(),
            source,
        })?;
        log::info!("[{name}] Counting incoming packets..");

        self.poll(&mut session).await
    }

    async fn poll<I: ProgramInstance>(
        &self,
        session: &mut Session<I>,
    ) -> Result<WorkerReport, FatalError> {
        debug_assert!(session.is_attached());
        let name = self.iface.name.as_str();
        let mut report = WorkerReport::new(name);

        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    log::info!("{}", shutdown_message(name));
                    return Ok(report);
                }
                _ = ticker.tick() => {
                    let count = session.read().map_err(|source| FatalError::Read {
                        iface: name.to_string(),
                        source,
                    })?;
                    report.record(count);
                    if let Some(line) = tick_message(name, count) {
                        log::info!("{line}");
                    }
                }
            }
        }
    }
}
