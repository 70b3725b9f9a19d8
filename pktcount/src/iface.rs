use nix::net::if_::{if_nameindex, if_nametoindex};

use crate::error::{BoxError, EnumerationError};

/// A host network adapter, as seen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub index: u32,
}

/// Where interfaces come from.
pub trait InterfaceSource: Send + Sync + 'static {
    /// List every interface on the host.
    fn list(&self) -> Result<Vec<Interface>, EnumerationError>;

    /// Resolve an interface name to its current kernel index.
    fn index_of(&self, name: &str) -> Result<u32, BoxError>;
}

/// Interfaces of the running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn list(&self) -> Result<Vec<Interface>, EnumerationError> {
        let ifaces = if_nameindex().map_err(|e| EnumerationError(Box::new(e)))?;
        Ok(ifaces
            .iter()
            .map(|i| Interface {
                name: i.name().to_string_lossy().into_owned(),
                index: i.index(),
            })
            .collect())
    }

    fn index_of(&self, name: &str) -> Result<u32, BoxError> {
        Ok(if_nametoindex(name)?)
    }
}

/// Include/exclude selection applied after enumeration.
///
/// An empty include list selects everything. Exclusion wins over inclusion.
#[derive(Debug, Clone, Default)]
pub struct InterfaceFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl InterfaceFilter {
    pub fn apply(&self, ifaces: Vec<Interface>) -> Vec<Interface> {
        for wanted in &self.include {
            if !ifaces.iter().any(|i| &i.name == wanted) {
                log::warn!("[{wanted}] Interface not found, skipping");
            }
        }

        ifaces
            .into_iter()
            .filter(|i| self.include.is_empty() || self.include.contains(&i.name))
            .filter(|i| !self.exclude.contains(&i.name))
            .collect()
    }
}
