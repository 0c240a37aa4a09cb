//! 分页相关的数据结构

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// 历史列表默认每页数量
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// 单个用户历史默认每页数量
pub const DEFAULT_USER_PAGE_SIZE: i64 = 10;
/// 每页数量上限，超出按上限处理
pub const MAX_PAGE_SIZE: i64 = 100;

/// 已校验的分页请求，page 从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::ValidationError(
                "Page must be at least 1".to_string(),
            ));
        }
        if page_size < 1 {
            return Err(AppError::ValidationError(
                "Limit must be at least 1".to_string(),
            ));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        // offset 需能用 i64 表示
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(AppError::ValidationError(
                "Page is out of range".to_string(),
            ));
        }
        Ok(Self { page, page_size })
    }

    /// 从查询参数构造，缺省时使用第 1 页和给定的默认每页数量
    pub fn from_query(page: Option<i64>, limit: Option<i64>, default_size: i64) -> AppResult<Self> {
        Self::new(page.unwrap_or(1), limit.unwrap_or(default_size))
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        ((self.page - 1) * self.page_size) as u64
    }

    pub fn limit(&self) -> u64 {
        self.page_size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// 当前页
    pub current: i64,
    /// 总页数
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
    /// 本页条数
    pub count: usize,
    /// 匹配的总条数
    pub total_records: u64,
}

impl PaginationInfo {
    pub fn new(request: &PageRequest, count: usize, total_records: u64) -> Self {
        let total_records_i64 = i64::try_from(total_records).unwrap_or(i64::MAX);
        let total = total_records_i64.saturating_add(request.page_size() - 1) / request.page_size();
        Self {
            current: request.page(),
            total,
            has_next: request.page() < total,
            has_prev: request.page() > 1,
            count,
            total_records,
        }
    }
}

/// 一页数据及分页信息
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total_records: u64) -> Self {
        let pagination = PaginationInfo::new(request, items.len(), total_records);
        Self { items, pagination }
    }
}
