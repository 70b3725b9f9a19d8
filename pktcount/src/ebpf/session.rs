use super::ProgramInstance;
use crate::error::BoxError;

/// Owns one loaded program instance and at most one attachment.
///
/// Dropping the session detaches (if attached) and then unloads, whatever
/// path the owning worker leaves by.
pub struct Session<I: ProgramInstance> {
    iface: String,
    instance: I,
    link: Option<I::Link>,
}

impl<I: ProgramInstance> Session<I> {
    pub fn new(iface: impl Into<String>, instance: I) -> Self {
        Self {
            iface: iface.into(),
            instance,
            link: None,
        }
    }

    /// Bind the instance to the interface with the given kernel index.
    pub fn attach(&mut self, if_index: u32) -> Result<(), BoxError> {
        if self.link.is_some() {
            return Err(format!("{} is already attached", self.iface).into());
        }
        self.link = Some(self.instance.attach(if_index)?);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    pub fn read(&self) -> Result<u64, BoxError> {
        self.instance.read()
    }
}

impl<I: ProgramInstance> Drop for Session<I> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            match self.instance.detach(link) {
                Ok(()) => log::debug!("[{}] Detached", self.iface),
                Err(e) => log::warn!("[{}] Detaching: {e}", self.iface),
            }
        }
        self.instance.unload();
        log::debug!("[{}] Unloaded", self.iface);
    }
}
