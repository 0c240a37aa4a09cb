use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 积分领取记录实体
/// 说明:
/// - 每次成功领取产生一条记录，创建后不再修改
/// - user_name 为领取时的用户名快照 (用户改名后不回写)
/// - new_total = previous_total + points_awarded
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    /// 本次获得积分 (1..=10)
    pub points_awarded: i32,
    pub previous_total: i64,
    pub new_total: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
