mod config;
mod ebpf;
mod error;
mod iface;
mod supervisor;
mod worker;

use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::ebpf::loader::{AyaCounterProgram, XdpMode};
use crate::iface::SystemInterfaces;
use crate::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "pktcount", about = "Count incoming packets on every network interface with XDP")]
struct Cli {
    /// Config file (default: ~/.config/pktcount/config.toml)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(short = 'd', long)]
    delay: Option<u64>,

    /// Only count on this interface (repeatable)
    #[arg(short = 'i', long = "iface")]
    ifaces: Vec<String>,

    /// XDP attach mode
    #[arg(long, value_enum)]
    xdp_mode: Option<XdpMode>,

    /// Compiled pktcount-ebpf object
    #[arg(short = 'p', long)]
    program: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;

    // CLI overrides
    if let Some(delay) = cli.delay {
        if delay == 0 {
            bail!("--delay must be greater than zero");
        }
        config.general.poll_interval_ms = delay;
    }
    if !cli.ifaces.is_empty() {
        config.interfaces.include = cli.ifaces;
    }
    if let Some(mode) = cli.xdp_mode {
        config.general.xdp_mode = mode;
    }
    if let Some(program) = cli.program {
        config.general.program_path = program;
    }

    remove_memlock_limit()?;

    let program = AyaCounterProgram::from_path(&config.general.program_path, config.general.xdp_mode)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match forward_interrupts(tokio::signal::ctrl_c, shutdown).await {
                Ok(()) => {
                    log::warn!("Interrupted again, exiting without teardown");
                    std::process::exit(130);
                }
                Err(e) => log::error!("listening for interrupt: {e}"),
            }
        }
    });

    let supervisor = Supervisor::new(
        program,
        SystemInterfaces,
        config.interface_filter(),
        config.poll_interval(),
    );
    for report in supervisor.run(shutdown).await? {
        log::debug!(
            "[{}] Stopped after {} polls, last count {}, {} regressions",
            report.interface,
            report.ticks,
            report.last_count,
            report.regressions
        );
    }
    Ok(())
}

/// Cancel `shutdown` on the first interrupt. Returns once a second one
/// arrives, leaving the caller to exit without waiting for teardown.
async fn forward_interrupts<F, Fut>(mut interrupt: F, shutdown: CancellationToken) -> io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    interrupt().await?;
    log::info!("Interrupt received, shutting down");
    shutdown.cancel();
    interrupt().await
}

/// Lift RLIMIT_MEMLOCK so maps can be created on kernels that still charge
/// BPF memory against it (before 5.11).
fn remove_memlock_limit() -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        bail!("removing memlock: {}", io::Error::last_os_error());
    }
    Ok(())
}
