use sea_orm_migration::prelude::*;

/// 积分领取历史（只追加）
/// user_id 不加外键：删除用户时由应用层级联删除历史记录
#[derive(DeriveIden)]
enum History {
    Table,
    Id,
    UserId,
    UserName,
    PointsAwarded,
    PreviousTotal,
    NewTotal,
    Timestamp,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(History::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(History::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(History::UserId).big_integer().not_null())
                    .col(ColumnDef::new(History::UserName).string_len(50).not_null())
                    .col(
                        ColumnDef::new(History::PointsAwarded)
                            .integer()
                            .not_null()
                            .check(Expr::col(History::PointsAwarded).between(1, 10)),
                    )
                    .col(
                        ColumnDef::new(History::PreviousTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(History::NewTotal).big_integer().not_null())
                    .col(
                        ColumnDef::new(History::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_history_timestamp")
                    .table(History::Table)
                    .col(History::Timestamp)
                    .to_owned(),
            )
            .await?;

        // 按用户查询历史: (user_id, timestamp DESC)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_history_user_id_timestamp")
                    .table(History::Table)
                    .col(History::UserId)
                    .col((History::Timestamp, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(History::Table).to_owned())
            .await
    }
}
