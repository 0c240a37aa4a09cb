use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::stores::{HistoryStore, UserStore};

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    history: Arc<dyn HistoryStore>,
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

fn required_name(name: Option<&str>) -> AppResult<UserName> {
    UserName::parse(name.unwrap_or_default())
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { users, history }
    }

    /// 获取全部用户（先重算名次，按名次排列）
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.users.recompute_ranks().await
    }

    /// 用户详情和领取统计
    pub async fn get_user(&self, user_id: i64) -> AppResult<UserDetailResponse> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        let stats = self.history.stats_for_user(user_id).await?;
        Ok(UserDetailResponse { user, stats })
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> AppResult<User> {
        let name = required_name(request.name.as_deref())?;
        let created = self.users.create_user(&name).await?;
        let ranked = self.users.recompute_ranks().await?;
        Ok(ranked
            .into_iter()
            .find(|u| u.id == created.id)
            .unwrap_or(created))
    }

    /// 改名，历史记录中的用户名快照保持不变
    pub async fn rename_user(&self, user_id: i64, request: UpdateUserRequest) -> AppResult<User> {
        let name = required_name(request.name.as_deref())?;
        self.users.rename_user(user_id, &name).await
    }

    /// 删除用户及其全部领取记录，然后重算名次
    pub async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        self.users.delete_user(user_id).await?;
        let removed = self.history.delete_for_user(user_id).await?;
        self.users.recompute_ranks().await?;
        log::info!("Deleted user {user_id} and {removed} history records");
        Ok(())
    }

    /// 全部积分清零并清空历史
    pub async fn reset_all(&self) -> AppResult<ResetSummary> {
        let users_reset = self.users.reset_all().await?;
        self.users.recompute_ranks().await?;
        let history_deleted = self.history.delete_all().await?;
        log::info!("Reset {users_reset} users, deleted {history_deleted} history records");
        Ok(ResetSummary {
            users_reset,
            history_deleted,
        })
    }
}
