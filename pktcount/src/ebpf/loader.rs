use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use aya::maps::Array;
use aya::programs::{Xdp, XdpFlags};
use aya::Ebpf;
use pktcount_common::{COUNTER_KEY, COUNTER_MAP, PROGRAM_NAME};
use serde::{Deserialize, Serialize};

use super::{CounterProgram, ProgramInstance};
use crate::error::BoxError;

/// How the XDP program is hooked into the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick (native if the driver supports it).
    #[default]
    Default,
    /// Generic mode, works on every interface.
    Skb,
    /// Native driver mode.
    Driver,
    /// Offloaded to the NIC.
    Hardware,
}

impl XdpMode {
    pub fn flags(self) -> XdpFlags {
        match self {
            XdpMode::Default => XdpFlags::default(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Driver => XdpFlags::DRV_MODE,
            XdpMode::Hardware => XdpFlags::HW_MODE,
        }
    }
}

/// The compiled `pktcount-ebpf` object, loaded into the kernel once per
/// interface.
pub struct AyaCounterProgram {
    object: Vec<u8>,
    mode: XdpMode,
}

impl AyaCounterProgram {
    /// Read the compiled object from disk. Each [`CounterProgram::load`]
    /// reuses these bytes.
    pub fn from_path(path: &Path, mode: XdpMode) -> Result<Self> {
        let object = fs::read(path)
            .with_context(|| format!("reading eBPF object from {}", path.display()))?;
        Ok(Self { object, mode })
    }
}

impl CounterProgram for AyaCounterProgram {
    type Instance = AyaInstance;

    fn load(&self) -> Result<AyaInstance, BoxError> {
        let ebpf = Ebpf::load(&self.object)?;
        let mut instance = AyaInstance {
            ebpf,
            flags: self.mode.flags(),
        };
        instance.xdp()?.load()?;
        Ok(instance)
    }
}

/// One kernel copy of the counting program and its `PKT_COUNT` map.
pub struct AyaInstance {
    ebpf: Ebpf,
    flags: XdpFlags,
}

impl AyaInstance {
    fn xdp(&mut self) -> Result<&mut Xdp, BoxError> {
        let program = self
            .ebpf
            .program_mut(PROGRAM_NAME)
            .ok_or_else(|| format!("program {PROGRAM_NAME} not found in object"))?;
        let xdp: &mut Xdp = program.try_into()?;
        Ok(xdp)
    }
}

impl ProgramInstance for AyaInstance {
    type Link = aya::programs::xdp::XdpLinkId;

    fn attach(&mut self, if_index: u32) -> Result<Self::Link, BoxError> {
        let flags = self.flags;
        Ok(self.xdp()?.attach_to_if_index(if_index, flags)?)
    }

    fn detach(&mut self, link: Self::Link) -> Result<(), BoxError> {
        self.xdp()?.detach(link)?;
        Ok(())
    }

    fn read(&self) -> Result<u64, BoxError> {
        let map = self
            .ebpf
            .map(COUNTER_MAP)
            .ok_or_else(|| format!("map {COUNTER_MAP} not found in object"))?;
        let counter: Array<_, u64> = Array::try_from(map)?;
        Ok(counter.get(&COUNTER_KEY, 0)?)
    }

    fn unload(&mut self) {
        let result = self.xdp().and_then(|p| p.unload().map_err(BoxError::from));
        if let Err(e) = result {
            log::warn!("unloading {PROGRAM_NAME}: {e}");
        }
    }
}
