pub mod airtable;
pub mod memory_store;
pub mod record_store;

pub use airtable::AirtableClient;
pub use memory_store::InMemoryStore;
pub use record_store::RecordStore;

use crate::config::{Config, StoreBackend};
use std::sync::Arc;
use tracing::info;

/// 按配置创建存储后端
pub fn build_store(config: &Config) -> Arc<dyn RecordStore> {
    let store: Arc<dyn RecordStore> = match config.store_backend {
        StoreBackend::Airtable => Arc::new(AirtableClient::new(config)),
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
    };
    info!("🗄️ 存储后端: {}", store.name());
    store
}
