pub mod loader;
#[cfg(test)]
pub mod mock;
pub mod session;

use crate::error::BoxError;

/// A kernel-loadable packet counting program.
///
/// Every call to [`CounterProgram::load`] yields an independent instance
/// with its own program handle and counter cell, even though the bytecode
/// is shared.
pub trait CounterProgram: Send + Sync + 'static {
    type Instance: ProgramInstance;

    fn load(&self) -> Result<Self::Instance, BoxError>;
}

/// One loaded copy of a [`CounterProgram`].
pub trait ProgramInstance: Send + 'static {
    /// Live binding of this instance to an interface's ingress path.
    type Link: Send + 'static;

    fn attach(&mut self, if_index: u32) -> Result<Self::Link, BoxError>;

    /// Remove a binding. Must happen before [`ProgramInstance::unload`].
    fn detach(&mut self, link: Self::Link) -> Result<(), BoxError>;

    /// Snapshot of the counter cell. Never resets it.
    fn read(&self) -> Result<u64, BoxError>;

    /// Release the kernel-side program and counter storage.
    fn unload(&mut self);
}
