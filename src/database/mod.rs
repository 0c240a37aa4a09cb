pub mod connection;
pub mod seed;

pub use connection::*;
pub use seed::*;

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use crate::stores::{
    HistoryStore, MemoryHistoryStore, MemoryUserStore, SeaOrmHistoryStore, SeaOrmUserStore,
    UserStore,
};

/// 根据配置打开存储: "memory" 使用进程内存储，否则连接数据库并执行迁移
pub async fn open_stores(
    config: &DatabaseConfig,
) -> AppResult<(Arc<dyn UserStore>, Arc<dyn HistoryStore>)> {
    if config.is_memory() {
        log::warn!("Using in-memory store, data is lost on restart");
        return Ok((
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryHistoryStore::new()),
        ));
    }

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok((
        Arc::new(SeaOrmUserStore::new(pool.clone())),
        Arc::new(SeaOrmHistoryStore::new(pool)),
    ))
}
