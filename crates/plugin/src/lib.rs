#![forbid(unsafe_code)]

//! Ballot plugin cache driver: command dispatch over a [`VoteStore`], the version guard
//! and snapshot rebuilds.

mod convert;
mod error;
mod handlers;
pub mod logging;
mod rebuild;
pub mod serve;

use bc_core::VersionRecord;
use bc_core::wire::{self, Command, decode};
use bc_storage::VoteStore;
use parking_lot::RwLock;

pub use error::PluginError;
pub use rebuild::snapshot_from_inventory;

/// What the record store calls on a cache plugin.
pub trait PluginDriver {
    /// Runs one command. Write commands persist `reply` and return it unchanged; read
    /// commands return their own encoded reply.
    fn exec(&self, command: &str, payload: &str, reply: &str) -> Result<String, PluginError>;

    /// Rebuilds the cache from an encoded inventory snapshot.
    fn build(&self, inventory: &str) -> Result<(), PluginError>;

    fn setup(&self) -> Result<(), PluginError>;

    fn check_version(&self) -> Result<VersionRecord, PluginError>;
}

pub struct BallotPlugin<S: VoteStore> {
    store: S,
    /// Held shared for each command and exclusively while the trust state may change, so
    /// a command queued behind a failing rebuild sees the outcome before it runs.
    trusted: RwLock<bool>,
}

impl<S: VoteStore> BallotPlugin<S> {
    /// With `enforce_version` set, commands are refused until `check_version` or
    /// `build` succeeds.
    pub fn new(store: S) -> Self {
        let trusted = !store.config().enforce_version;
        Self {
            store,
            trusted: RwLock::new(trusted),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_trusted(&self) -> bool {
        *self.trusted.read()
    }

    /// Stores one proposal record version pushed by the surrounding record cache.
    pub fn put_record(&self, payload: &str) -> Result<(), PluginError> {
        let record: wire::Record = decode("record", payload)?;
        self.store.put_record(&convert::record(record)?)?;
        Ok(())
    }

    pub fn version_reply(&self) -> Result<String, PluginError> {
        let record = self.check_version()?;
        Ok(wire::encode(
            "check-version reply",
            &convert::version_to_wire(record),
        )?)
    }
}

impl<S: VoteStore> PluginDriver for BallotPlugin<S> {
    fn exec(&self, command: &str, payload: &str, reply: &str) -> Result<String, PluginError> {
        let Some(cmd) = Command::parse(command) else {
            return Err(PluginError::InvalidCommand(command.to_string()));
        };
        let trusted = self.trusted.read();
        if !*trusted {
            return Err(PluginError::Untrusted);
        }
        tracing::trace!(command = %cmd, write = cmd.is_write(), "exec");
        handlers::dispatch(&self.store, cmd, payload, reply)
    }

    fn build(&self, inventory: &str) -> Result<(), PluginError> {
        let inventory: wire::InventoryReply = decode("inventory", inventory)?;
        let snapshot = snapshot_from_inventory(inventory)?;
        let mut trusted = self.trusted.write();
        match self.store.build(&snapshot) {
            Ok(()) => {
                *trusted = true;
                Ok(())
            }
            Err(err) => {
                *trusted = !self.store.config().enforce_version;
                Err(err.into())
            }
        }
    }

    fn setup(&self) -> Result<(), PluginError> {
        self.store.setup()?;
        Ok(())
    }

    fn check_version(&self) -> Result<VersionRecord, PluginError> {
        let mut trusted = self.trusted.write();
        match self.store.check_version() {
            Ok(record) => {
                tracing::debug!(
                    plugin_id = %record.plugin_id,
                    version = %record.version,
                    "cache version verified"
                );
                *trusted = true;
                Ok(record)
            }
            Err(err) => {
                *trusted = !self.store.config().enforce_version;
                Err(err.into())
            }
        }
    }
}
