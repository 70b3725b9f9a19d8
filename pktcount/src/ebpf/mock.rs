//! Test double for [`CounterProgram`] that records every call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use super::{CounterProgram, ProgramInstance};
use crate::error::{BoxError, EnumerationError};
use crate::iface::{Interface, InterfaceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Load(usize),
    Attach(usize, u32),
    Read(usize),
    Detach(usize),
    Unload(usize),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    loads: usize,
    history: HashMap<usize, Vec<u64>>,
    links: HashMap<u32, usize>,
    load_threads: Vec<ThreadId>,
}

/// Every read of an instance advances its counter by `step`, unless a
/// read script is set.
#[derive(Clone)]
pub struct MockProgram {
    step: u64,
    script: Option<Arc<Vec<u64>>>,
    fail_load: Option<usize>,
    fail_attach: Option<u32>,
    fail_read: Option<u32>,
    state: Arc<Mutex<State>>,
}

impl MockProgram {
    pub fn new(step: u64) -> Self {
        Self {
            step,
            script: None,
            fail_load: None,
            fail_attach: None,
            fail_read: None,
            state: Arc::default(),
        }
    }

    /// Each instance returns these values in order, then repeats the last.
    pub fn with_reads(mut self, values: &[u64]) -> Self {
        self.script = Some(Arc::new(values.to_vec()));
        self
    }

    /// Fail the `n`th load (counting from zero).
    pub fn fail_load_on(mut self, n: usize) -> Self {
        self.fail_load = Some(n);
        self
    }

    pub fn fail_attach_on(mut self, if_index: u32) -> Self {
        self.fail_attach = Some(if_index);
        self
    }

    pub fn fail_read_on(mut self, if_index: u32) -> Self {
        self.fail_read = Some(if_index);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn active_links(&self, if_index: u32) -> usize {
        self.state.lock().unwrap().links.get(&if_index).copied().unwrap_or(0)
    }

    /// Values returned by each read of instance `id`, in order.
    pub fn history(&self, id: usize) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Threads that ran `load`.
    pub fn load_threads(&self) -> Vec<ThreadId> {
        self.state.lock().unwrap().load_threads.clone()
    }

    pub fn reads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Read(_)))
            .count()
    }
}

impl CounterProgram for MockProgram {
    type Instance = MockInstance;

    fn load(&self) -> Result<MockInstance, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.load_threads.push(thread::current().id());
        let id = state.loads;
        state.loads += 1;
        if self.fail_load == Some(id) {
            return Err("operation not permitted".into());
        }
        state.calls.push(Call::Load(id));
        Ok(MockInstance {
            id,
            step: self.step,
            script: self.script.clone(),
            fail_attach: self.fail_attach,
            fail_read: self.fail_read,
            if_index: None,
            state: self.state.clone(),
        })
    }
}

pub struct MockInstance {
    id: usize,
    step: u64,
    script: Option<Arc<Vec<u64>>>,
    fail_attach: Option<u32>,
    fail_read: Option<u32>,
    if_index: Option<u32>,
    state: Arc<Mutex<State>>,
}

impl ProgramInstance for MockInstance {
    type Link = u32;

    fn attach(&mut self, if_index: u32) -> Result<u32, BoxError> {
        if self.fail_attach == Some(if_index) {
            return Err("no such device".into());
        }
        let mut state = self.state.lock().unwrap();
        let links = state.links.entry(if_index).or_insert(0);
        if *links > 0 {
            return Err("device or resource busy".into());
        }
        *links += 1;
        state.calls.push(Call::Attach(self.id, if_index));
        self.if_index = Some(if_index);
        Ok(if_index)
    }

    fn detach(&mut self, link: u32) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        if let Some(links) = state.links.get_mut(&link) {
            *links -= 1;
        }
        state.calls.push(Call::Detach(self.id));
        self.if_index = None;
        Ok(())
    }

    fn read(&self) -> Result<u64, BoxError> {
        if self.fail_read.is_some() && self.fail_read == self.if_index {
            return Err("bad file descriptor".into());
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Read(self.id));
        let history = state.history.entry(self.id).or_default();
        let value = match &self.script {
            Some(script) => script
                .get(history.len())
                .or(script.last())
                .copied()
                .unwrap_or(0),
            None => history.last().copied().unwrap_or(0) + self.step,
        };
        history.push(value);
        Ok(value)
    }

    fn unload(&mut self) {
        self.state.lock().unwrap().calls.push(Call::Unload(self.id));
    }
}

/// Fixed interface table. Names listed in `vanished` enumerate fine but
/// fail the later lookup by name.
pub struct StaticInterfaces {
    ifaces: Option<Vec<Interface>>,
    vanished: Vec<String>,
}

impl StaticInterfaces {
    pub fn new(names: &[&str]) -> Self {
        let ifaces = names
            .iter()
            .enumerate()
            .map(|(i, name)| Interface {
                name: name.to_string(),
                index: i as u32 + 1,
            })
            .collect();
        Self {
            ifaces: Some(ifaces),
            vanished: Vec::new(),
        }
    }

    pub fn broken() -> Self {
        Self {
            ifaces: None,
            vanished: Vec::new(),
        }
    }

    pub fn vanish(mut self, name: &str) -> Self {
        self.vanished.push(name.to_string());
        self
    }
}

impl InterfaceSource for StaticInterfaces {
    fn list(&self) -> Result<Vec<Interface>, EnumerationError> {
        self.ifaces
            .clone()
            .ok_or_else(|| EnumerationError("netlink unavailable".into()))
    }

    fn index_of(&self, name: &str) -> Result<u32, BoxError> {
        if self.vanished.iter().any(|v| v == name) {
            return Err("no such device".into());
        }
        self.ifaces
            .iter()
            .flatten()
            .find(|i| i.name == name)
            .map(|i| i.index)
            .ok_or_else(|| "no such device".into())
    }
}
