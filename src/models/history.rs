use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::entities::history_entity;

use super::{PaginationInfo, User};

/// 单次领取最少积分
pub const POINTS_MIN: i32 = 1;
/// 单次领取最多积分
pub const POINTS_MAX: i32 = 10;

/// 单次领取的积分，取值范围 [1, 10]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PointsAward(i32);

impl PointsAward {
    pub fn new(points: i32) -> Option<Self> {
        (POINTS_MIN..=POINTS_MAX)
            .contains(&points)
            .then_some(Self(points))
    }

    /// 超出范围时取边界值
    pub fn saturating(points: i32) -> Self {
        Self(points.clamp(POINTS_MIN, POINTS_MAX))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<PointsAward> for i64 {
    fn from(award: PointsAward) -> Self {
        i64::from(award.0)
    }
}

/// 待写入的领取记录
/// new_total 由 previous_total + points_awarded 推导，不单独存放
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryRecord {
    pub user_id: i64,
    pub user_name: String,
    pub points_awarded: PointsAward,
    pub previous_total: i64,
}

impl NewHistoryRecord {
    pub fn new(
        user_id: i64,
        user_name: String,
        points_awarded: PointsAward,
        previous_total: i64,
    ) -> Self {
        Self {
            user_id,
            user_name,
            points_awarded,
            previous_total,
        }
    }

    pub fn new_total(&self) -> i64 {
        self.previous_total + i64::from(self.points_awarded)
    }
}

/// 领取记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    /// 领取时的用户名快照
    pub user_name: String,
    pub points_awarded: i32,
    pub previous_total: i64,
    pub new_total: i64,
    pub points_difference: i64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn from_new(id: i64, record: NewHistoryRecord, timestamp: DateTime<Utc>) -> Self {
        let new_total = record.new_total();
        Self {
            id,
            user_id: record.user_id,
            user_name: record.user_name,
            points_awarded: record.points_awarded.get(),
            previous_total: record.previous_total,
            new_total,
            points_difference: new_total - record.previous_total,
            timestamp,
        }
    }
}

impl From<history_entity::Model> for HistoryRecord {
    fn from(m: history_entity::Model) -> Self {
        HistoryRecord {
            id: m.id,
            user_id: m.user_id,
            user_name: m.user_name,
            points_awarded: m.points_awarded,
            previous_total: m.previous_total,
            new_total: m.new_total,
            points_difference: m.new_total - m.previous_total,
            timestamp: m.timestamp,
        }
    }
}

/// 历史查询条件，各字段均可选，同时给出时取交集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub user_id: Option<i64>,
    /// 用户名子串，大小写不敏感
    pub user_name: Option<String>,
    /// 起始时间（含）
    pub start: Option<DateTime<Utc>>,
    /// 截止时间（含）
    pub end: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if self.user_id.is_some_and(|id| id != record.user_id) {
            return false;
        }
        if let Some(needle) = &self.user_name
            && !record
                .user_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        if self.start.is_some_and(|start| record.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| record.timestamp > end) {
            return false;
        }
        true
    }
}

/// 单个用户的领取统计
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserClaimStats {
    pub total_claims: i64,
    pub total_points_earned: i64,
    pub average_points: f64,
    pub max_points: i32,
    pub min_points: i32,
    pub last_claim: DateTime<Utc>,
}

/// 排行榜统计（按用户聚合）
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    /// 该用户最早一条记录中的用户名
    pub user_name: String,
    pub total_claims: i64,
    pub total_points_earned: i64,
    pub average_points: f64,
    pub last_activity: DateTime<Utc>,
}

/// 全局统计，无记录时各项为 0 / null
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_claims: i64,
    pub total_points_awarded: i64,
    pub average_points_per_claim: f64,
    pub max_points_in_single_claim: i32,
    pub min_points_in_single_claim: i32,
    pub first_claim: Option<DateTime<Utc>>,
    pub last_claim: Option<DateTime<Utc>>,
}

/// 按天 (UTC) 统计
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub claims_count: i64,
    pub total_points: i64,
    pub average_points: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatsResponse {
    pub overall: OverallStats,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub daily_stats: Vec<DailyStats>,
}

/// 用户历史: 用户信息、当前页记录与统计
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHistoryResponse {
    pub user: User,
    pub history: Vec<HistoryRecord>,
    pub stats: Option<UserClaimStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserHistoryPage {
    pub data: UserHistoryResponse,
    pub pagination: PaginationInfo,
}

/// 历史列表查询参数
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HistoryQuery {
    /// 页码 (默认 1)
    pub page: Option<i64>,
    /// 每页数量
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecentQuery {
    /// 条数 (默认 10)
    pub limit: Option<i64>,
}

/// 历史搜索参数，日期支持 RFC 3339 或 YYYY-MM-DD
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistorySearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing)]
    pub page: Option<i64>,
    #[serde(skip_serializing)]
    pub limit: Option<i64>,
}

/// 聚合累加器，内存存储与按天统计共用
#[derive(Debug, Clone, Default)]
pub(crate) struct ClaimTally {
    pub count: i64,
    pub sum: i64,
    pub max: i32,
    pub min: i32,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl ClaimTally {
    pub fn add(&mut self, points: i32, at: DateTime<Utc>) {
        if self.count == 0 {
            self.max = points;
            self.min = points;
        } else {
            self.max = self.max.max(points);
            self.min = self.min.min(points);
        }
        self.count += 1;
        self.sum += i64::from(points);
        self.first = Some(self.first.map_or(at, |t| t.min(at)));
        self.last = Some(self.last.map_or(at, |t| t.max(at)));
    }

    pub fn average(&self) -> f64 {
        average(self.sum, self.count)
    }

    pub fn into_user_stats(self) -> Option<UserClaimStats> {
        let last_claim = self.last?;
        Some(UserClaimStats {
            total_claims: self.count,
            total_points_earned: self.sum,
            average_points: self.average(),
            max_points: self.max,
            min_points: self.min,
            last_claim,
        })
    }

    pub fn into_overall(self) -> OverallStats {
        OverallStats {
            total_claims: self.count,
            total_points_awarded: self.sum,
            average_points_per_claim: self.average(),
            max_points_in_single_claim: self.max,
            min_points_in_single_claim: self.min,
            first_claim: self.first,
            last_claim: self.last,
        }
    }
}

pub(crate) fn average(sum: i64, count: i64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// 将 (积分, 时间) 序列按 UTC 日期分组，日期升序
pub(crate) fn daily_breakdown(
    claims: impl IntoIterator<Item = (i32, DateTime<Utc>)>,
) -> Vec<DailyStats> {
    let mut days: BTreeMap<NaiveDate, ClaimTally> = BTreeMap::new();
    for (points, at) in claims {
        days.entry(at.date_naive()).or_default().add(points, at);
    }
    days.into_iter()
        .map(|(date, tally)| DailyStats {
            date,
            claims_count: tally.count,
            total_points: tally.sum,
            average_points: tally.average(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(user_id: i64, name: &str, at: DateTime<Utc>) -> HistoryRecord {
        let new = NewHistoryRecord::new(user_id, name.into(), PointsAward::saturating(3), 0);
        HistoryRecord::from_new(1, new, at)
    }

    #[test]
    fn test_points_award_range() {
        assert!(PointsAward::new(0).is_none());
        assert!(PointsAward::new(11).is_none());
        assert_eq!(PointsAward::new(1).map(PointsAward::get), Some(1));
        assert_eq!(PointsAward::new(10).map(PointsAward::get), Some(10));
        assert_eq!(PointsAward::saturating(42).get(), 10);
        assert_eq!(PointsAward::saturating(-3).get(), 1);
    }

    #[test]
    fn test_new_total_is_derived() {
        let award = PointsAward::new(7).unwrap();
        let new = NewHistoryRecord::new(9, "Neha".into(), award, 15);
        assert_eq!(new.new_total(), 22);

        let stored = HistoryRecord::from_new(3, new, Utc::now());
        assert_eq!(stored.new_total, stored.previous_total + 7);
        assert_eq!(stored.points_difference, 7);
    }

    #[test]
    fn test_filter_matches() {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        let rec = record(4, "Pooja", t0);

        assert!(HistoryFilter::default().matches(&rec));
        assert!(HistoryFilter::for_user(4).matches(&rec));
        assert!(!HistoryFilter::for_user(5).matches(&rec));

        let by_name = HistoryFilter {
            user_name: Some("OOJ".into()),
            ..Default::default()
        };
        assert!(by_name.matches(&rec));

        // 时间范围两端均包含
        let range = HistoryFilter {
            start: Some(t0),
            end: Some(t0),
            ..Default::default()
        };
        assert!(range.matches(&rec));
        let later = HistoryFilter {
            start: Some(t0 + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&rec));
    }

    #[test]
    fn test_tally_and_daily_breakdown() {
        let day1 = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 9, 2, 23, 59, 0).unwrap();

        let mut tally = ClaimTally::default();
        assert!(tally.clone().into_user_stats().is_none());
        tally.add(4, day2);
        tally.add(10, day1);
        tally.add(1, day1);
        let stats = tally.clone().into_user_stats().unwrap();
        assert_eq!(stats.total_claims, 3);
        assert_eq!(stats.total_points_earned, 15);
        assert_eq!(stats.max_points, 10);
        assert_eq!(stats.min_points, 1);
        assert_eq!(stats.last_claim, day2);
        assert!((stats.average_points - 5.0).abs() < f64::EPSILON);
        assert_eq!(tally.into_overall().first_claim, Some(day1));

        let daily = daily_breakdown(vec![(4, day2), (10, day1), (1, day1)]);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, day1.date_naive());
        assert_eq!(daily[0].claims_count, 2);
        assert_eq!(daily[0].total_points, 11);
        assert_eq!(daily[1].total_points, 4);
    }

    #[test]
    fn test_empty_overall_is_zeroed() {
        let overall = ClaimTally::default().into_overall();
        assert_eq!(overall, OverallStats::default());
    }
}
