use sea_orm_migration::prelude::*;

/// 排行榜用户表
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    TotalPoints,
    Rank,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(50).not_null())
                    .col(
                        ColumnDef::new(Users::TotalPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::Rank).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 排名重算按 (total_points DESC, created_at ASC) 排序
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_total_points_created_at")
                    .table(Users::Table)
                    .col((Users::TotalPoints, IndexOrder::Desc))
                    .col((Users::CreatedAt, IndexOrder::Asc))
                    .to_owned(),
            )
            .await?;

        // 用户名大小写不敏感唯一（表达式索引，sea-query 不支持，直接写 SQL）
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_name_lower ON users (LOWER(name))",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}
