use std::cmp::Reverse;

use crate::models::User;

/// 排名顺序: 积分降序，创建时间升序，id 升序
pub fn sort_for_ranking(users: &mut [User]) {
    users.sort_by_key(|u| (Reverse(u.total_points), u.created_at, u.id));
}

/// 排序并按位置写入名次 1..=N，返回名次发生变化的 (id, rank)
pub fn assign_ranks(users: &mut [User]) -> Vec<(i64, i32)> {
    sort_for_ranking(users);
    let mut changed = Vec::new();
    for (pos, user) in users.iter_mut().enumerate() {
        let rank = i32::try_from(pos + 1).unwrap_or(i32::MAX);
        if user.rank != rank {
            user.rank = rank;
            changed.push((user.id, rank));
        }
    }
    changed
}
