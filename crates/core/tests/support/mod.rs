//! Shared test helpers for `calsync-core` integration tests.
//!
//! In-memory implementations of every port plus a scripted provider client,
//! so scenario tests can focus on behaviour instead of wiring.

#![allow(dead_code)]

pub mod provider;
pub mod stores;

use std::sync::Arc;

use calsync_core::{SyncPorts, SyncService, SyncSettings};

pub use provider::{MockClientFactory, MockProviderClient};
pub use stores::{InMemoryEventStore, InMemoryGrants, InMemorySyncRecordStore, RecordingSessions};

/// All mocks behind one service instance.
pub struct Harness {
    pub records: Arc<InMemorySyncRecordStore>,
    pub events: Arc<InMemoryEventStore>,
    pub client: Arc<MockProviderClient>,
    pub factory: Arc<MockClientFactory>,
    pub sessions: Arc<RecordingSessions>,
    pub grants: Arc<InMemoryGrants>,
    pub service: SyncService,
}

impl Harness {
    pub fn new() -> Self {
        let records = Arc::new(InMemorySyncRecordStore::default());
        let events = Arc::new(InMemoryEventStore::default());
        let client = Arc::new(MockProviderClient::default());
        let factory = Arc::new(MockClientFactory::new(Arc::clone(&client)));
        let sessions = Arc::new(RecordingSessions::default());
        let grants = Arc::new(InMemoryGrants::default());

        let ports = SyncPorts {
            records: records.clone(),
            events: events.clone(),
            clients: factory.clone(),
            sessions: sessions.clone(),
            grants: grants.clone(),
        };
        let service = SyncService::new(ports, SyncSettings::default());

        Self { records, events, client, factory, sessions, grants, service }
    }
}
