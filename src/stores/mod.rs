//! 存储抽象: 用户表与领取历史。
//!
//! `UserStore` / `HistoryStore` 各有两个实现:
//! - `SeaOrmUserStore` / `SeaOrmHistoryStore`: PostgreSQL (sea-orm)
//! - `MemoryUserStore` / `MemoryHistoryStore`: 进程内存储，用于测试与本地运行
//!
//! 存储层不负责跨表一致性: 删除用户时的历史级联、积分变化后的排名重算
//! 都由调用方（services）显式完成。

pub mod history_store;
pub mod memory;
pub mod ranking;
pub mod user_store;

pub use history_store::SeaOrmHistoryStore;
pub use memory::{MemoryHistoryStore, MemoryUserStore};
pub use user_store::SeaOrmUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    DailyStats, HistoryFilter, HistoryRecord, LeaderboardEntry, NewHistoryRecord, OverallStats,
    PageRequest, User, UserClaimStats, UserName,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// 新建用户: 积分 0，名次 0（由调用方重算）。重名（大小写不敏感）返回 Conflict
    async fn create_user(&self, name: &UserName) -> AppResult<User>;

    async fn find_user(&self, id: i64) -> AppResult<Option<User>>;

    /// 按名次升序（同名次按 id）
    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn count_users(&self) -> AppResult<u64>;

    /// 原子增加积分，结果小于 0 时置 0；不重算排名
    async fn add_points(&self, id: i64, amount: i64) -> AppResult<User>;

    /// 全量重算名次: 积分降序，创建时间升序，id 升序。返回按名次排列的用户
    async fn recompute_ranks(&self) -> AppResult<Vec<User>>;

    /// 改名，唯一性检查排除自身
    async fn rename_user(&self, id: i64, name: &UserName) -> AppResult<User>;

    /// 仅删除用户本身
    async fn delete_user(&self, id: i64) -> AppResult<()>;

    /// 全部积分清零，返回受影响用户数
    async fn reset_all(&self) -> AppResult<u64>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: NewHistoryRecord) -> AppResult<HistoryRecord>;

    async fn find_record(&self, id: i64) -> AppResult<Option<HistoryRecord>>;

    /// 按时间倒序分页，返回 (当前页, 匹配总数)
    async fn query_page(
        &self,
        filter: &HistoryFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<HistoryRecord>, u64)>;

    async fn recent_activity(&self, limit: u64) -> AppResult<Vec<HistoryRecord>>;

    /// 用户无记录时返回 None
    async fn stats_for_user(&self, user_id: i64) -> AppResult<Option<UserClaimStats>>;

    /// 有记录的用户按积分总和降序
    async fn leaderboard_stats(&self) -> AppResult<Vec<LeaderboardEntry>>;

    async fn overall_stats(&self) -> AppResult<OverallStats>;

    async fn daily_stats(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyStats>>;

    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64>;

    async fn delete_all(&self) -> AppResult<u64>;

    async fn delete_one(&self, id: i64) -> AppResult<()>;
}
