use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::Db;
use crate::services::ai::LlmProvider;
use crate::services::messaging::MessagingProvider;
use crate::services::registry::SessionRegistry;
use crate::services::sheets::SheetsLogger;

pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub messaging: Box<dyn MessagingProvider>,
    pub sheets: Box<dyn SheetsLogger>,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Runs `f` against the shared connection. Never call across an `.await`.
    pub fn with_db<R>(&self, f: impl FnOnce(&Connection) -> anyhow::Result<R>) -> anyhow::Result<R> {
        let conn = self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
        f(&conn)
    }
}
