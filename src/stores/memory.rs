use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::{
    ClaimTally, DailyStats, HistoryFilter, HistoryRecord, LeaderboardEntry, NewHistoryRecord,
    OverallStats, PageRequest, User, UserClaimStats, UserName, daily_breakdown,
};

use super::{HistoryStore, UserStore, ranking};

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: BTreeMap<i64, User>,
}

impl UserTable {
    fn name_taken(&self, name: &UserName, except: Option<i64>) -> bool {
        let folded = name.folded();
        self.rows
            .values()
            .any(|u| Some(u.id) != except && u.name.to_lowercase() == folded)
    }
}

/// 进程内用户表，单把锁保证排名重算不会与其它写交错
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<UserTable>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

fn name_conflict(name: &UserName) -> AppError {
    AppError::Conflict(format!("User with name '{name}' already exists"))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, name: &UserName) -> AppResult<User> {
        let mut table = self.inner.lock().await;
        if table.name_taken(name, None) {
            return Err(name_conflict(name));
        }
        table.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: table.next_id,
            name: name.as_str().to_string(),
            total_points: 0,
            rank: 0,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.inner.lock().await.rows.values().cloned().collect();
        users.sort_by_key(|u| (u.rank, u.id));
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<u64> {
        Ok(self.inner.lock().await.rows.len() as u64)
    }

    async fn add_points(&self, id: i64, amount: i64) -> AppResult<User> {
        let mut table = self.inner.lock().await;
        let user = table.rows.get_mut(&id).ok_or_else(user_not_found)?;
        user.total_points = (user.total_points + amount).max(0);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn recompute_ranks(&self) -> AppResult<Vec<User>> {
        let mut table = self.inner.lock().await;
        let mut users: Vec<User> = table.rows.values().cloned().collect();
        for (id, rank) in ranking::assign_ranks(&mut users) {
            if let Some(row) = table.rows.get_mut(&id) {
                row.rank = rank;
            }
        }
        Ok(users)
    }

    async fn rename_user(&self, id: i64, name: &UserName) -> AppResult<User> {
        let mut table = self.inner.lock().await;
        if !table.rows.contains_key(&id) {
            return Err(user_not_found());
        }
        if table.name_taken(name, Some(id)) {
            return Err(name_conflict(name));
        }
        let user = table.rows.get_mut(&id).ok_or_else(user_not_found)?;
        user.name = name.as_str().to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> AppResult<()> {
        self.inner
            .lock()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(user_not_found)
    }

    async fn reset_all(&self) -> AppResult<u64> {
        let mut table = self.inner.lock().await;
        let now = Utc::now();
        for user in table.rows.values_mut() {
            user.total_points = 0;
            user.updated_at = now;
        }
        Ok(table.rows.len() as u64)
    }
}

#[derive(Default)]
struct HistoryTable {
    next_id: i64,
    /// 按插入顺序
    rows: Vec<HistoryRecord>,
}

impl HistoryTable {
    /// 时间倒序（同一时间按 id 倒序）
    fn newest_first<'a>(&'a self, filter: &'a HistoryFilter) -> Vec<&'a HistoryRecord> {
        let mut matched: Vec<&HistoryRecord> =
            self.rows.iter().filter(|r| filter.matches(r)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        matched
    }
}

#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<Mutex<HistoryTable>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: NewHistoryRecord) -> AppResult<HistoryRecord> {
        let mut table = self.inner.lock().await;
        table.next_id += 1;
        let stored = HistoryRecord::from_new(table.next_id, record, Utc::now());
        table.rows.push(stored.clone());
        Ok(stored)
    }

    async fn find_record(&self, id: i64) -> AppResult<Option<HistoryRecord>> {
        let table = self.inner.lock().await;
        Ok(table.rows.iter().find(|r| r.id == id).cloned())
    }

    async fn query_page(
        &self,
        filter: &HistoryFilter,
        page: &PageRequest,
    ) -> AppResult<(Vec<HistoryRecord>, u64)> {
        let table = self.inner.lock().await;
        let matched = table.newest_first(filter);
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn recent_activity(&self, limit: u64) -> AppResult<Vec<HistoryRecord>> {
        let table = self.inner.lock().await;
        let all = HistoryFilter::default();
        Ok(table
            .newest_first(&all)
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn stats_for_user(&self, user_id: i64) -> AppResult<Option<UserClaimStats>> {
        let table = self.inner.lock().await;
        let mut tally = ClaimTally::default();
        for r in table.rows.iter().filter(|r| r.user_id == user_id) {
            tally.add(r.points_awarded, r.timestamp);
        }
        Ok(tally.into_user_stats())
    }

    async fn leaderboard_stats(&self) -> AppResult<Vec<LeaderboardEntry>> {
        let table = self.inner.lock().await;
        // 插入顺序遍历，第一次出现的用户名即最早快照
        let mut groups: HashMap<i64, (String, ClaimTally)> = HashMap::new();
        for r in &table.rows {
            groups
                .entry(r.user_id)
                .or_insert_with(|| (r.user_name.clone(), ClaimTally::default()))
                .1
                .add(r.points_awarded, r.timestamp);
        }
        let mut entries: Vec<LeaderboardEntry> = groups
            .into_iter()
            .filter_map(|(user_id, (user_name, tally))| {
                let average_points = tally.average();
                Some(LeaderboardEntry {
                    user_id,
                    user_name,
                    total_claims: tally.count,
                    total_points_earned: tally.sum,
                    average_points,
                    last_activity: tally.last?,
                })
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
        let table = self.inner.lock().await;
        let mut tally = ClaimTally::default();
        for r in &table.rows {
            tally.add(r.points_awarded, r.timestamp);
        }
        Ok(tally.into_overall())
    }

    async fn daily_stats(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyStats>> {
        let table = self.inner.lock().await;
        Ok(daily_breakdown(
            table
                .rows
                .iter()
                .filter(|r| r.timestamp >= since)
                .map(|r| (r.points_awarded, r.timestamp)),
        ))
    }

    async fn delete_for_user(&self, user_id: i64) -> AppResult<u64> {
        let mut table = self.inner.lock().await;
        let before = table.rows.len();
        table.rows.retain(|r| r.user_id != user_id);
        Ok((before - table.rows.len()) as u64)
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let mut table = self.inner.lock().await;
        let removed = table.rows.len() as u64;
        table.rows.clear();
        Ok(removed)
    }

    async fn delete_one(&self, id: i64) -> AppResult<()> {
        let mut table = self.inner.lock().await;
        let pos = table
            .rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound("History record not found".to_string()))?;
        table.rows.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PointsAward;
    use chrono::Duration;

    fn name(raw: &str) -> UserName {
        UserName::parse(raw).unwrap()
    }

    fn claim(user_id: i64, user_name: &str, points: i32, previous_total: i64) -> NewHistoryRecord {
        NewHistoryRecord::new(
            user_id,
            user_name.to_string(),
            PointsAward::new(points).unwrap(),
            previous_total,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_case_insensitive_duplicate() {
        let store = MemoryUserStore::new();
        store.create_user(&name("alice")).await.unwrap();
        let err = store.create_user(&name("Alice")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_user_is_unranked_until_recompute() {
        let store = MemoryUserStore::new();
        let user = store.create_user(&name("Kamal")).await.unwrap();
        assert_eq!(user.total_points, 0);
        assert_eq!(user.rank, 0);

        store.recompute_ranks().await.unwrap();
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().rank, 1);
    }

    #[tokio::test]
    async fn test_rename_excludes_self_from_uniqueness() {
        let store = MemoryUserStore::new();
        let raj = store.create_user(&name("Raj")).await.unwrap();
        store.create_user(&name("Neha")).await.unwrap();

        let renamed = store.rename_user(raj.id, &name("RAJ")).await.unwrap();
        assert_eq!(renamed.name, "RAJ");

        let err = store.rename_user(raj.id, &name("neha")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = store.rename_user(999, &name("Nobody")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_points_clamps_and_reports_missing() {
        let store = MemoryUserStore::new();
        let user = store.create_user(&name("Anita")).await.unwrap();

        assert_eq!(store.add_points(user.id, 4).await.unwrap().total_points, 4);
        assert_eq!(store.add_points(user.id, -10).await.unwrap().total_points, 0);

        let err = store.add_points(42, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let store = MemoryUserStore::new();
        let a = store.create_user(&name("Amit")).await.unwrap();
        let b = store.create_user(&name("Pooja")).await.unwrap();
        store.add_points(b.id, 9).await.unwrap();

        store.delete_user(a.id).await.unwrap();
        assert!(matches!(
            store.delete_user(a.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        assert_eq!(store.reset_all().await.unwrap(), 1);
        assert_eq!(store.find_user(b.id).await.unwrap().unwrap().total_points, 0);
    }

    #[tokio::test]
    async fn test_history_query_page_orders_newest_first() {
        let store = MemoryHistoryStore::new();
        for i in 0..5 {
            store
                .append(claim(1, "Vikash", 2, i64::from(i) * 2))
                .await
                .unwrap();
        }
        store.append(claim(2, "Sanak", 5, 0)).await.unwrap();

        let page = PageRequest::new(1, 2).unwrap();
        let (items, total) = store
            .query_page(&HistoryFilter::for_user(1), &page)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert!(items[0].id > items[1].id);
        assert_eq!(items[0].new_total, 10);

        let page3 = PageRequest::new(3, 2).unwrap();
        let (items, _) = store
            .query_page(&HistoryFilter::for_user(1), &page3)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].previous_total, 0);

        let by_name = HistoryFilter {
            user_name: Some("sAn".into()),
            ..Default::default()
        };
        let (items, total) = store.query_page(&by_name, &page).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].user_id, 2);

        let future = HistoryFilter {
            start: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        };
        let (items, total) = store.query_page(&future, &page).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_recent_activity_limit() {
        let store = MemoryHistoryStore::new();
        for i in 0..4 {
            store.append(claim(1, "Rahul", 1, i)).await.unwrap();
        }
        let recent = store.recent_activity(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].previous_total, 3);
    }

    #[tokio::test]
    async fn test_stats_for_user_without_claims_is_none() {
        let store = MemoryHistoryStore::new();
        store.append(claim(1, "Rahul", 6, 0)).await.unwrap();
        assert!(store.stats_for_user(2).await.unwrap().is_none());

        let stats = store.stats_for_user(1).await.unwrap().unwrap();
        assert_eq!(stats.total_claims, 1);
        assert_eq!(stats.total_points_earned, 6);
        assert_eq!(stats.max_points, 6);
        assert_eq!(stats.min_points, 6);
    }

    #[tokio::test]
    async fn test_leaderboard_uses_first_seen_name_and_sum_order() {
        let store = MemoryHistoryStore::new();
        store.append(claim(1, "Priya", 2, 0)).await.unwrap();
        store.append(claim(2, "Kamal", 9, 0)).await.unwrap();
        // 改名后的快照不影响聚合中的用户名
        store.append(claim(1, "Priya S", 3, 2)).await.unwrap();

        let board = store.leaderboard_stats().await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, 2);
        assert_eq!(board[1].user_name, "Priya");
        assert_eq!(board[1].total_claims, 2);
        assert_eq!(board[1].total_points_earned, 5);
        assert!((board[1].average_points - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_history_deletes() {
        let store = MemoryHistoryStore::new();
        let first = store.append(claim(1, "Rahul", 1, 0)).await.unwrap();
        store.append(claim(1, "Rahul", 1, 1)).await.unwrap();
        store.append(claim(2, "Kamal", 1, 0)).await.unwrap();

        store.delete_one(first.id).await.unwrap();
        assert!(matches!(
            store.delete_one(first.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(store.delete_for_user(1).await.unwrap(), 1);
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert_eq!(store.overall_stats().await.unwrap(), OverallStats::default());
    }
}
