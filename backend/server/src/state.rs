use std::sync::Arc;

use super::{config::Config, database::Store, error::AppError, events::EventHub, session::SessionKeys};

pub struct State {
    pub config: Config,
    pub store: Store,
    pub events: EventHub,
    pub sessions: SessionKeys,
}

impl State {
    /// Opens the configured database, migrates, seeds and wires the event hub.
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let store = Store::open(&config.db_path)?;
        store.seed()?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Store) -> Arc<Self> {
        let events = EventHub::new(config.event_capacity);
        let sessions = SessionKeys::new(&config.session_secret, config.session_ttl);

        Arc::new(Self {
            config,
            store,
            events,
            sessions,
        })
    }
}
