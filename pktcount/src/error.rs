use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure in an interface worker's lifecycle. Any of these stops the
/// whole daemon.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("[{iface}] loading counter program: {source}")]
    Load {
        iface: String,
        #[source]
        source: BoxError,
    },
    #[error("[{iface}] looking up interface index: {source}")]
    Lookup {
        iface: String,
        #[source]
        source: BoxError,
    },
    #[error("[{iface}] attaching XDP: {source}")]
    Attach {
        iface: String,
        #[source]
        source: BoxError,
    },
    #[error("[{iface}] reading packet counter: {source}")]
    Read {
        iface: String,
        #[source]
        source: BoxError,
    },
    #[error("worker task failed: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),
}

impl FatalError {
    /// Name of the interface the failure happened on, if known.
    pub fn interface(&self) -> Option<&str> {
        match self {
            FatalError::Load { iface, .. }
            | FatalError::Lookup { iface, .. }
            | FatalError::Attach { iface, .. }
            | FatalError::Read { iface, .. } => Some(iface),
            FatalError::WorkerPanicked(_) => None,
        }
    }
}

/// Listing host interfaces failed. Not fatal: the daemon just has nothing
/// to count.
#[derive(Debug, Error)]
#[error("listing interfaces: {0}")]
pub struct EnumerationError(#[source] pub BoxError);
