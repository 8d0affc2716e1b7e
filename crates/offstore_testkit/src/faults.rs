//! Fault injection for journal backends.
//!
//! [`FaultyProvider`] opens in-memory databases whose journal fails on
//! demand, which lets tests check that a failed commit leaves no trace.

use offstore_storage::{
    Connection, ConnectionProvider, InMemoryBackend, JournalBackend, StorageError,
    StorageResult, UpgradeFn,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Weak};

/// A failure the journal will produce on its next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// No failure.
    #[default]
    None,
    /// The next append fails before writing anything.
    FailAppend,
    /// The next append writes half of the frame, then fails.
    TearAppend,
    /// The next sync fails after the frame was appended.
    FailSync,
    /// The next append writes half of the frame and fails, and removing the
    /// partial frame fails too.
    TearWithoutUndo,
    /// The next truncate fails.
    FailTruncate,
}

/// Shared handle used to arm a [`Fault`]. Each armed fault fires once.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    armed: Arc<Mutex<Fault>>,
}

impl FaultSwitch {
    /// Creates a disarmed switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `fault` for the next matching journal call.
    pub fn arm(&self, fault: Fault) {
        *self.armed.lock() = fault;
    }

    /// Returns the currently armed fault.
    pub fn armed(&self) -> Fault {
        *self.armed.lock()
    }

    fn take_if(&self, fault: Fault) -> bool {
        let mut armed = self.armed.lock();
        if *armed == fault {
            *armed = Fault::None;
            true
        } else {
            false
        }
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected {what} failure")))
}

/// In-memory journal that fails when its [`FaultSwitch`] says so.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    switch: FaultSwitch,
}

impl FailingBackend {
    /// Wraps `inner`, failing according to `switch`.
    pub fn new(inner: InMemoryBackend, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }
}

impl JournalBackend for FailingBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        self.inner.read_all()
    }

    fn append(&mut self, frame: &[u8]) -> StorageResult<u64> {
        if self.switch.take_if(Fault::FailAppend) {
            return Err(injected("append"));
        }
        if self.switch.take_if(Fault::TearAppend) {
            self.inner.append(&frame[..frame.len() / 2])?;
            return Err(injected("torn append"));
        }
        if self.switch.take_if(Fault::TearWithoutUndo) {
            self.inner.append(&frame[..frame.len() / 2])?;
            self.switch.arm(Fault::FailTruncate);
            return Err(injected("torn append"));
        }
        self.inner.append(frame)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.take_if(Fault::FailSync) {
            return Err(injected("flush"));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.take_if(Fault::FailSync) {
            return Err(injected("sync"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.switch.take_if(Fault::FailTruncate) {
            return Err(injected("truncate"));
        }
        self.inner.truncate(new_size)
    }
}

/// Provider of in-memory databases whose journals share one [`FaultSwitch`].
///
/// Each database allows one live connection at a time.
#[derive(Debug, Default)]
pub struct FaultyProvider {
    databases: Mutex<HashMap<String, (InMemoryBackend, Weak<Connection>)>>,
    switch: FaultSwitch,
}

impl FaultyProvider {
    /// Creates a provider with a disarmed switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the switch controlling every journal of this provider.
    pub fn switch(&self) -> FaultSwitch {
        self.switch.clone()
    }

    /// Returns the journal bytes of a database.
    pub fn journal(&self, name: &str) -> Option<Vec<u8>> {
        self.databases.lock().get(name).map(|(journal, _)| journal.data())
    }
}

impl ConnectionProvider for FaultyProvider {
    fn open(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut UpgradeFn<'_>,
    ) -> StorageResult<Arc<Connection>> {
        let mut databases = self.databases.lock();
        let (journal, live) = databases.entry(name.to_string()).or_default();
        if live.upgrade().is_some_and(|open| !open.is_closed()) {
            return Err(StorageError::DatabaseLocked);
        }
        let backend = FailingBackend::new(journal.clone(), self.switch.clone());
        let connection = Arc::new(Connection::open_with_backend(
            name,
            version,
            Box::new(backend),
            true,
            upgrade,
        )?);
        *live = Arc::downgrade(&connection);
        Ok(connection)
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let mut databases = self.databases.lock();
        if let Some((_, live)) = databases.get(name) {
            if live.upgrade().is_some_and(|open| !open.is_closed()) {
                return Err(StorageError::DatabaseLocked);
            }
        }
        databases.remove(name);
        Ok(())
    }
}
