use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::stores::{HistoryStore, UserStore};

/// 最近动态默认条数
pub const DEFAULT_RECENT_LIMIT: i64 = 10;
/// 按天统计覆盖的天数
pub const DAILY_STATS_DAYS: i64 = 7;

#[derive(Clone)]
pub struct HistoryService {
    users: Arc<dyn UserStore>,
    history: Arc<dyn HistoryStore>,
}

impl HistoryService {
    pub fn new(users: Arc<dyn UserStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { users, history }
    }

    /// 全部领取记录（分页，时间倒序）
    pub async fn list(&self, query: &HistoryQuery) -> AppResult<Paged<HistoryRecord>> {
        let page = PageRequest::from_query(query.page, query.limit, DEFAULT_PAGE_SIZE)?;
        let (items, total) = self
            .history
            .query_page(&HistoryFilter::default(), &page)
            .await?;
        Ok(Paged::new(items, &page, total))
    }

    pub async fn recent(&self, query: &RecentQuery) -> AppResult<Vec<HistoryRecord>> {
        let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        if limit < 1 {
            return Err(AppError::ValidationError(
                "Limit must be at least 1".to_string(),
            ));
        }
        self.history
            .recent_activity(limit.min(MAX_PAGE_SIZE) as u64)
            .await
    }

    /// 单个用户的领取记录与统计
    pub async fn user_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> AppResult<UserHistoryPage> {
        let page = PageRequest::from_query(query.page, query.limit, DEFAULT_USER_PAGE_SIZE)?;
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let (history, total) = self
            .history
            .query_page(&HistoryFilter::for_user(user_id), &page)
            .await?;
        let stats = self.history.stats_for_user(user_id).await?;
        let pagination = PaginationInfo::new(&page, history.len(), total);

        Ok(UserHistoryPage {
            data: UserHistoryResponse {
                user,
                history,
                stats,
            },
            pagination,
        })
    }

    /// 全局统计、排行榜统计与最近 7 天按天统计
    pub async fn stats(&self) -> AppResult<HistoryStatsResponse> {
        let overall = self.history.overall_stats().await?;
        let leaderboard = self.history.leaderboard_stats().await?;
        let since = Utc::now() - Duration::days(DAILY_STATS_DAYS);
        let daily_stats = self.history.daily_stats(since).await?;
        Ok(HistoryStatsResponse {
            overall,
            leaderboard,
            daily_stats,
        })
    }

    /// 按用户名 / 日期范围搜索
    pub async fn search(&self, query: &HistorySearchQuery) -> AppResult<Paged<HistoryRecord>> {
        let page = PageRequest::from_query(query.page, query.limit, DEFAULT_PAGE_SIZE)?;
        let filter = HistoryFilter {
            user_id: None,
            user_name: query
                .user_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            start: query
                .start_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, false))
                .transpose()?,
            end: query
                .end_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, true))
                .transpose()?,
        };
        if let (Some(start), Some(end)) = (filter.start, filter.end)
            && start > end
        {
            return Err(AppError::ValidationError(
                "startDate must not be after endDate".to_string(),
            ));
        }

        let (items, total) = self.history.query_page(&filter, &page).await?;
        Ok(Paged::new(items, &page, total))
    }

    pub async fn delete_record(&self, id: i64) -> AppResult<()> {
        self.history.delete_one(id).await?;
        log::info!("Deleted history record {id}");
        Ok(())
    }
}

/// 解析搜索日期: RFC 3339 时间戳，或 YYYY-MM-DD（作为截止日期时覆盖全天）
fn parse_date_bound(raw: &str, end_of_day: bool) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date: {raw}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| Utc.from_utc_datetime(&t))
        .ok_or_else(|| AppError::ValidationError(format!("Invalid date: {raw}")))
}
