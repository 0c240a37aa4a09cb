use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use std::collections::HashMap;

use crate::entities::history_entity as history;
use crate::error::{AppError, AppResult};
use crate::models::{
    DailyStats, HistoryFilter, HistoryRecord, LeaderboardEntry, NewHistoryRecord, OverallStats,
    PageRequest, UserClaimStats, average, daily_breakdown,
};

use super::HistoryStore;

#[derive(Clone)]
pub struct SeaOrmHistoryStore {
    pool: DatabaseConnection,
}

impl SeaOrmHistoryStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

/// LIKE 通配符转义，配合 ESCAPE '\\' 使用
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn apply_filter(mut select: Select<history::Entity>, filter: &HistoryFilter) -> Select<history::Entity> {
    if let Some(user_id) = filter.user_id {
        select = select.filter(history::Column::UserId.eq(user_id));
    }
    if let Some(needle) = filter.user_name.as_deref().filter(|n| !n.is_empty()) {
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        select = select
            .filter(
                Expr::expr(Func::lower(Expr::col(history::Column::UserName)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
    }
    if let Some(start) = filter.start {
        select = select.filter(history::Column::Timestamp.gte(start));
    }
    if let Some(end) = filter.end {
        select = select.filter(history::Column::Timestamp.lte(end));
    }
    select
}

/// 单行聚合结果，无记录时除 total_claims 外均为 NULL
#[derive(Debug, FromQueryResult)]
struct AggregateRow {
    total_claims: i64,
    total_points: Option<i64>,
    max_points: Option<i32>,
    min_points: Option<i32>,
    first_claim: Option<DateTime<Utc>>,
    last_claim: Option<DateTime<Utc>>,
}

/// 按 user_id 分组的聚合
#[derive(Debug, FromQueryResult)]
struct UserGroupRow {
    user_id: i64,
    total_claims: i64,
    total_points: i64,
    first_record_id: i64,
    last_activity: DateTime<Utc>,
}

impl SeaOrmHistoryStore {
    async fn aggregate(&self, select: Select<history::Entity>) -> AppResult<AggregateRow> {
        let row = select
            .select_only()
            .column_as(Expr::col(history::Column::Id).count(), "total_claims")
            .column_as(Expr::col(history::Column::PointsAwarded).sum(), "total_points")
            .column_as(Expr::col(history::Column::PointsAwarded).max(), "max_points")
            .column_as(Expr::col(history::Column::PointsAwarded).min(), "min_points")
            .column_as(Expr::col(history::Column::Timestamp).min(), "first_claim")
            .column_as(Expr::col(history::Column::Timestamp).max(), "last_claim")
            .into_model::<AggregateRow>()
            .one(&self.pool)
            .await?;
        Ok(row.unwrap_or(AggregateRow {
            total_claims: 0,
            total_points: None,
            max_points: None,
            min_points: None,
            first_claim: None,
            last_claim: None,
        }))
    }
}

#[async_trait]
impl HistoryStore for SeaOrmHistoryStore {
    async fn append(&self, record: NewHistoryRecord) -> AppResult<HistoryRecord> {
        let new_total = record.new_total();
        let model = history::ActiveModel {
            user_id: Set(record.user_id),
            user_name: Set(record.user_name),
            points_awarded: Set(record.points_awarded.get()),
            previous_total: Set(record.previous_total),
            new_total: Set(new_total),
            timestamp: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(model.into())
    }

    async fn find_record(&self, id: i64) -> AppResult<Option<HistoryRecord>> {
        let model = history::Entity::find_by_id(id).one(&self.pool).await?;
        Ok(model.map(Into::into))
    }

    async fn query_page(
        &self,
        filter: &HistoryFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<HistoryRecord>, u64)> {
        let base = apply_filter(history::Entity::find(), filter);
        let total = base.clone().count(&self.pool).await?;
        let items = base
            .order_by_desc(history::Column::Timestamp)
            .order_by_desc(history::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.pool)
            .await?;
        Ok((items.into_iter().map(Into::into).collect(), total))
    }

    async fn recent_activity(&self, limit: u64) -> AppResult<Vec<HistoryRecord>> {
        let items = history::Entity::find()
            .order_by_desc(history::Column::Timestamp)
            .order_by_desc(history::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    async fn stats_for_user(&self, user_id: i64) -> AppResult<Option<UserClaimStats>> {
        let row = self
            .aggregate(history::Entity::find().filter(history::Column::UserId.eq(user_id)))
            .await?;
        if row.total_claims == 0 {
            return Ok(None);
        }
        let total_points = row.total_points.unwrap_or(0);
        Ok(row.last_claim.map(|last_claim| UserClaimStats {
            total_claims: row.total_claims,
            total_points_earned: total_points,
            average_points: average(total_points, row.total_claims),
            max_points: row.max_points.unwrap_or(0),
            min_points: row.min_points.unwrap_or(0),
            last_claim,
        }))
    }

    async fn leaderboard_stats(&self) -> AppResult<Vec<LeaderboardEntry>> {
        let groups = history::Entity::find()
            .select_only()
            .column(history::Column::UserId)
            .column_as(Expr::col(history::Column::Id).count(), "total_claims")
            .column_as(Expr::col(history::Column::PointsAwarded).sum(), "total_points")
            .column_as(Expr::col(history::Column::Id).min(), "first_record_id")
            .column_as(Expr::col(history::Column::Timestamp).max(), "last_activity")
            .group_by(history::Column::UserId)
            .into_model::<UserGroupRow>()
            .all(&self.pool)
            .await?;

        // 每个用户最早一条记录的用户名快照
        let first_ids: Vec<i64> = groups.iter().map(|g| g.first_record_id).collect();
        let names: HashMap<i64, String> = if first_ids.is_empty() {
            HashMap::new()
        } else {
            history::Entity::find()
                .filter(history::Column::Id.is_in(first_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|m| (m.id, m.user_name))
                .collect()
        };

        let mut entries: Vec<LeaderboardEntry> = groups
            .into_iter()
            .map(|g| LeaderboardEntry {
                user_id: g.user_id,
                user_name: names.get(&g.first_record_id).cloned().unwrap_or_default(),
                total_claims: g.total_claims,
                total_points_earned: g.total_points,
                average_points: average(g.total_points, g.total_claims),
                last_activity: g.last_activity,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_points_earned
                .cmp(&a.total_points_earned)
                .then(a.user_id.cmp(&b.user_id))
        });
        Ok(entries)
    }

    async fn overall_stats(&self) -> AppResult<OverallStats> {
        let row = self.aggregate(history::Entity::find()).await?;
        let total_points = row.total_points.unwrap_or(0);
        Ok(OverallStats {
            total_claims: row.total_claims,
            total_points_awarded: total_points,
            average_points_per_claim: average(total_points, row.total_claims),
            max_points_in_single_claim: row.max_points.unwrap_or(0),
            min_points_in_single_claim: row.min_points.unwrap_or(0),
            first_claim: row.first_claim,
            last_claim: row.last_claim,
        })
    }

    async fn daily_stats(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyStats>> {
        // 按天分组在应用层完成，避免依赖数据库方言的日期函数
        let rows = history::Entity::find()
            .filter(history::Column::Timestamp.gte(since))
            .order_by_asc(history::Column::Timestamp)
            .all(&self.pool)
            .await?;
        Ok(daily_breakdown(
            rows.into_iter().map(|m| (m.points_awarded, m.timestamp)),
        ))
    }

    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64> {
        let result = history::Entity::delete_many()
            .filter(history::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = history::Entity::delete_many().exec(&self.pool).await?;
        Ok(result.rows_affected)
    }

    async fn delete_one(&self, id: i64) -> AppResult<()> {
        let result = history::Entity::delete_by_id(id).exec(&self.pool).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("History record not found".to_string()));
        }
        Ok(())
    }
}
