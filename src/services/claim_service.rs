use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{ClaimResponse, NewHistoryRecord};
use crate::stores::{HistoryStore, UserStore};
use crate::utils::PointSource;

#[derive(Clone)]
pub struct ClaimService {
    users: Arc<dyn UserStore>,
    history: Arc<dyn HistoryStore>,
    points: Arc<dyn PointSource>,
}

impl ClaimService {
    pub fn new(
        users: Arc<dyn UserStore>,
        history: Arc<dyn HistoryStore>,
        points: Arc<dyn PointSource>,
    ) -> Self {
        Self {
            users,
            history,
            points,
        }
    }

    /// 领取积分
    ///
    /// 逻辑:
    /// 1. 读取用户（不存在返回 NotFound）
    /// 2. 从积分来源抽取 1..=10 分
    /// 3. 原子增加积分
    /// 4. 全量重算名次
    /// 5. 写入领取记录（用户名为领取时快照）
    /// 6. 返回重算后的用户与积分变化
    ///
    /// 三次写入不在同一事务中: 第 3 步成功而第 4/5 步失败时，积分不回滚，
    /// 以 StorageError 返回。名次会在下一次重算时自愈，缺失的历史记录不会补写。
    pub async fn claim(&self, user_id: i64) -> AppResult<ClaimResponse> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let award = self.points.next_award();
        let updated = self.users.add_points(user_id, award.into()).await?;
        // 以自增后的结果倒推，保证同一用户并发领取时历史链仍然连续
        let previous_total = updated.total_points - i64::from(award);

        let ranked = self
            .users
            .recompute_ranks()
            .await
            .map_err(|e| partial_claim(user_id, "rank recomputation", e))?;

        let record = NewHistoryRecord::new(user.id, user.name.clone(), award, previous_total);
        let stored = self
            .history
            .append(record)
            .await
            .map_err(|e| partial_claim(user_id, "history append", e))?;

        let current = ranked
            .into_iter()
            .find(|u| u.id == user_id)
            .unwrap_or(updated);

        log::info!(
            "{} points awarded to {} (user {}): {} -> {}, rank {} -> {}",
            stored.points_awarded,
            user.name,
            user_id,
            stored.previous_total,
            stored.new_total,
            user.rank,
            current.rank
        );

        Ok(ClaimResponse::new(
            current,
            stored.points_awarded,
            stored.previous_total,
            stored.new_total,
            user.rank,
        ))
    }
}

fn partial_claim(user_id: i64, step: &str, err: AppError) -> AppError {
    log::error!("Claim for user {user_id} added points but {step} failed: {err}");
    AppError::StorageError(format!(
        "Points were added but {step} failed: {err}"
    ))
}
