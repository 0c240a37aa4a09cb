use crate::error::AppResult;
use crate::models::UserName;
use crate::stores::UserStore;

/// 默认用户（用户表为空时写入）
pub const DEFAULT_USERS: [&str; 10] = [
    "Rahul", "Kamal", "Sanak", "Priya", "Amit", "Neha", "Raj", "Pooja", "Vikash", "Anita",
];

/// 用户表为空时写入默认用户并重算排名，返回写入数量
pub async fn seed_default_users(users: &dyn UserStore) -> AppResult<usize> {
    if users.count_users().await? > 0 {
        return Ok(0);
    }
    for raw in DEFAULT_USERS {
        users.create_user(&UserName::parse(raw)?).await?;
    }
    users.recompute_ranks().await?;
    log::info!("Default users initialized ({})", DEFAULT_USERS.len());
    Ok(DEFAULT_USERS.len())
}
