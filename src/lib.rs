pub mod api;
pub mod config;
pub mod db;
pub mod storage;

pub use db::DbPool;

use config::Config;
use storage::FileStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub files: FileStore,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, files: FileStore) -> Self {
        Self { config, db, files }
    }
}
