use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::user_entity;
use crate::error::{AppError, AppResult};

use super::UserClaimStats;

/// 用户名最少字符数（去除首尾空白后）
pub const NAME_MIN_CHARS: usize = 2;
/// 用户名最多字符数
pub const NAME_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub total_points: i64,
    /// 名次 (1..=N)，0 表示尚未排名
    pub rank: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user_entity::Model> for User {
    fn from(m: user_entity::Model) -> Self {
        User {
            id: m.id,
            name: m.name,
            total_points: m.total_points,
            rank: m.rank,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 已校验的用户名: 去除首尾空白，长度 2..=50 个字符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserName(String);

impl UserName {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationError(
                "User name is required".to_string(),
            ));
        }
        let len = trimmed.chars().count();
        if len < NAME_MIN_CHARS {
            return Err(AppError::ValidationError(format!(
                "Name must be at least {NAME_MIN_CHARS} characters long"
            )));
        }
        if len > NAME_MAX_CHARS {
            return Err(AppError::ValidationError(format!(
                "Name cannot exceed {NAME_MAX_CHARS} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 唯一性比较使用的小写形式（与数据库 LOWER(name) 索引一致）
    pub fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for UserName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Rahul")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[schema(example = "Rahul K")]
    pub name: Option<String>,
}

/// 用户详情: 用户信息 + 领取统计（无领取记录时 stats 为 null）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: User,
    pub stats: Option<UserClaimStats>,
}

/// 领取积分结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    /// 领取后的用户（含重算后的名次）
    pub user: User,
    pub points_awarded: i32,
    pub previous_total: i64,
    pub new_total: i64,
    /// 领取前的名次，0 表示此前未排名
    pub previous_rank: i32,
    /// 名次变化，正数表示上升
    pub rank_change: i32,
}

impl ClaimResponse {
    pub fn new(
        user: User,
        points_awarded: i32,
        previous_total: i64,
        new_total: i64,
        previous_rank: i32,
    ) -> Self {
        let rank_change = if previous_rank == 0 {
            0
        } else {
            previous_rank - user.rank
        };
        Self {
            user,
            points_awarded,
            previous_total,
            new_total,
            previous_rank,
            rank_change,
        }
    }
}

/// 全部重置结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub users_reset: u64,
    pub history_deleted: u64,
}
