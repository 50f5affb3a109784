//! # Instance Directory
//!
//! A process may host several arena instances (lobbies, event arenas,
//! portal destinations). The directory is the one explicit, shared object
//! that knows which instances exist; it exists so that cross-instance
//! features - transferring a client through a portal - never reach for
//! ambient global state.
//!
//! Instances register on startup and unregister on shutdown. Lookups
//! return a cloneable handle carrying the instance's command sender; the
//! receiving instance drains transfers at its own tick boundary like any
//! other command.

use crate::game_loop::ClientCommand;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies one arena instance within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// A registered instance: its name and the way in.
#[derive(Clone)]
pub struct InstanceHandle {
    /// Instance id.
    pub id: InstanceId,
    /// Human-readable name ("sandbox-1", "event-arena").
    pub name: Arc<str>,
    /// Command queue of the instance's scheduler.
    pub commands: Sender<ClientCommand>,
}

/// Process-wide directory of active instances.
///
/// Interior lock only; every method takes `&self`, so the directory can
/// be shared behind an `Arc` between instance threads.
#[derive(Default)]
pub struct InstanceDirectory {
    entries: RwLock<HashMap<InstanceId, InstanceHandle>>,
}

impl InstanceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance. Re-registering an id replaces the previous
    /// handle and is reported, since it usually means a shutdown path
    /// forgot to unregister.
    pub fn register(&self, handle: InstanceHandle) {
        let id = handle.id;
        if self.entries.write().insert(id, handle).is_some() {
            tracing::warn!("{} re-registered without unregister", id);
        } else {
            tracing::info!("{} registered", id);
        }
    }

    /// Unregisters an instance. Returns true if it was present.
    pub fn unregister(&self, id: InstanceId) -> bool {
        let removed = self.entries.write().remove(&id).is_some();
        if removed {
            tracing::info!("{} unregistered", id);
        }
        removed
    }

    /// Looks up an instance by id.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<InstanceHandle> {
        self.entries.read().get(&id).cloned()
    }

    /// All registered instances, ascending by id.
    #[must_use]
    pub fn list(&self) -> Vec<InstanceHandle> {
        let mut handles: Vec<_> = self.entries.read().values().cloned().collect();
        handles.sort_by_key(|h| h.id);
        handles
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Transfers a client to another instance by enqueueing a connect on
    /// the target's command queue (e.g. walking through a portal). The
    /// caller is responsible for disconnecting the client locally.
    ///
    /// Returns false if the target is unknown or its queue is closed.
    pub fn transfer(&self, target: InstanceId, command: ClientCommand) -> bool {
        let Some(handle) = self.get(target) else {
            tracing::warn!("transfer to unknown {}", target);
            return false;
        };
        match handle.commands.send(command) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!("transfer to {} failed: queue closed", target);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::game_loop::ArenaServer;
    use bulwark_shared::defs;
    use bulwark_shared::ClientId;

    fn handle_for(server: &ArenaServer, id: u32, name: &str) -> InstanceHandle {
        InstanceHandle {
            id: InstanceId(id),
            name: name.into(),
            commands: server.command_handle(),
        }
    }

    #[test]
    fn test_register_lookup_unregister() {
        let server = ArenaServer::new(ServerConfig::default());
        let directory = InstanceDirectory::new();

        directory.register(handle_for(&server, 1, "sandbox"));
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.get(InstanceId(1)).unwrap().name.as_ref(), "sandbox");

        assert!(directory.unregister(InstanceId(1)));
        assert!(!directory.unregister(InstanceId(1)));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_transfer_reaches_target_instance() {
        let mut target = ArenaServer::new(ServerConfig::default());
        let directory = InstanceDirectory::new();
        directory.register(handle_for(&target, 2, "event"));

        let client = ClientId(9);
        let sent = directory.transfer(
            InstanceId(2),
            ClientCommand::Connect {
                client,
                name: "traveler".to_owned(),
                definition: Box::new(defs::standard_tank()),
            },
        );
        assert!(sent);

        // The transfer lands at the target's next tick boundary.
        target.tick();
        assert!(target.client_entity(client).is_some());
    }

    #[test]
    fn test_transfer_to_unknown_instance_fails() {
        let directory = InstanceDirectory::new();
        assert!(!directory.transfer(
            InstanceId(404),
            ClientCommand::Disconnect { client: ClientId(1) },
        ));
    }
}
