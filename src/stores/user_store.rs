use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserName};

use super::{UserStore, ranking};

#[derive(Clone)]
pub struct SeaOrmUserStore {
    pool: DatabaseConnection,
    /// 本进程内串行化排名重算，避免两次重算交错写出重复名次
    rank_lock: Arc<Mutex<()>>,
}

impl SeaOrmUserStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self {
            pool,
            rank_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self, id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// 大小写不敏感查重（LOWER(name) 与唯一索引一致）
    async fn ensure_name_available(&self, name: &UserName, except: Option<i64>) -> AppResult<()> {
        let mut query = users::Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(users::Column::Name))).eq(name.folded()));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        if query.one(&self.pool).await?.is_some() {
            return Err(name_conflict(name));
        }
        Ok(())
    }
}

fn name_conflict(name: &UserName) -> AppError {
    AppError::Conflict(format!("User with name '{name}' already exists"))
}

/// 并发创建时查重可能放过，由唯一索引兜底
fn map_write_err(err: DbErr, name: &UserName) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => name_conflict(name),
        _ => AppError::DatabaseError(err),
    }
}

#[async_trait]
impl UserStore for SeaOrmUserStore {
    async fn create_user(&self, name: &UserName) -> AppResult<User> {
        self.ensure_name_available(name, None).await?;
        let now = Utc::now();
        let model = users::ActiveModel {
            name: Set(name.as_str().to_string()),
            total_points: Set(0),
            rank: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| map_write_err(e, name))?;
        log::info!("Created user {} ({})", model.id, model.name);
        Ok(model.into())
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        let model = users::Entity::find_by_id(id).one(&self.pool).await?;
        Ok(model.map(Into::into))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let list = users::Entity::find()
            .order_by_asc(users::Column::Rank)
            .order_by_asc(users::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn count_users(&self) -> AppResult<u64> {
        Ok(users::Entity::find().count(&self.pool).await?)
    }

    async fn add_points(&self, id: i64, amount: i64) -> AppResult<User> {
        // 单条 UPDATE 自增，避免读改写丢失并发领取
        let mut update = users::Entity::update_many()
            .col_expr(
                users::Column::TotalPoints,
                Expr::col(users::Column::TotalPoints).add(amount),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id));
        if amount < 0 {
            update = update.filter(users::Column::TotalPoints.gte(-amount));
        }
        let result = update.exec(&self.pool).await?;

        if result.rows_affected == 0 {
            // 用户不存在，或扣减后会小于 0（置 0）
            let model = self.load(id).await?;
            let mut am = model.into_active_model();
            am.total_points = Set(0);
            am.updated_at = Set(Utc::now());
            return Ok(am.update(&self.pool).await?.into());
        }

        Ok(self.load(id).await?.into())
    }

    async fn recompute_ranks(&self) -> AppResult<Vec<User>> {
        let _guard = self.rank_lock.lock().await;
        let txn = self.pool.begin().await?;

        let mut list: Vec<User> = users::Entity::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        let changed = ranking::assign_ranks(&mut list);

        for (id, rank) in &changed {
            users::Entity::update_many()
                .col_expr(users::Column::Rank, Expr::value(*rank))
                .filter(users::Column::Id.eq(*id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        log::debug!(
            "Recomputed ranks for {} users ({} changed)",
            list.len(),
            changed.len()
        );
        Ok(list)
    }

    async fn rename_user(&self, id: i64, name: &UserName) -> AppResult<User> {
        let model = self.load(id).await?;
        self.ensure_name_available(name, Some(id)).await?;
        let mut am = model.into_active_model();
        am.name = Set(name.as_str().to_string());
        am.updated_at = Set(Utc::now());
        let updated = am
            .update(&self.pool)
            .await
            .map_err(|e| map_write_err(e, name))?;
        Ok(updated.into())
    }

    async fn delete_user(&self, id: i64) -> AppResult<()> {
        let result = users::Entity::delete_by_id(id).exec(&self.pool).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn reset_all(&self) -> AppResult<u64> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::TotalPoints, Expr::value(0i64))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }
}
