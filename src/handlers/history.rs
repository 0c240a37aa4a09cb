use actix_web::{web, HttpResponse, Result, ResponseError};
use serde_json::json;
use crate::models::*;
use crate::services::HistoryService;

#[utoipa::path(
    get,
    path = "/history",
    tag = "history",
    params(
        ("page" = Option<i64>, Query, description = "页码"),
        ("limit" = Option<i64>, Query, description = "每页数量 (默认 20，最多 100)")
    ),
    responses(
        (status = 200, description = "获取领取记录成功"),
        (status = 400, description = "分页参数错误")
    )
)]
pub async fn list_history(
    history_service: web::Data<HistoryService>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    match history_service.list(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page.items,
            "pagination": page.pagination
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/history/recent",
    tag = "history",
    params(
        ("limit" = Option<i64>, Query, description = "条数 (默认 10)")
    ),
    responses(
        (status = 200, description = "获取最近动态成功", body = [HistoryRecord])
    )
)]
pub async fn recent_activity(
    history_service: web::Data<HistoryService>,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse> {
    match history_service.recent(&query).await {
        Ok(records) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": records,
            "count": records.len()
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/history/user/{user_id}",
    tag = "history",
    params(
        ("user_id" = i64, Path, description = "用户ID"),
        ("page" = Option<i64>, Query, description = "页码"),
        ("limit" = Option<i64>, Query, description = "每页数量 (默认 10)")
    ),
    responses(
        (status = 200, description = "获取用户领取记录与统计成功"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn user_history(
    history_service: web::Data<HistoryService>,
    path: web::Path<i64>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    match history_service
        .user_history(path.into_inner(), &query)
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page.data,
            "pagination": page.pagination
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/history/stats",
    tag = "history",
    responses(
        (status = 200, description = "获取统计成功", body = HistoryStatsResponse)
    )
)]
pub async fn history_stats(history_service: web::Data<HistoryService>) -> Result<HttpResponse> {
    match history_service.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/history/search",
    tag = "history",
    params(
        ("userName" = Option<String>, Query, description = "用户名（部分匹配，不区分大小写）"),
        ("startDate" = Option<String>, Query, description = "开始日期 (YYYY-MM-DD 或 RFC 3339)"),
        ("endDate" = Option<String>, Query, description = "结束日期 (YYYY-MM-DD 包含当天)"),
        ("page" = Option<i64>, Query, description = "页码"),
        ("limit" = Option<i64>, Query, description = "每页数量")
    ),
    responses(
        (status = 200, description = "搜索成功"),
        (status = 400, description = "日期或分页参数错误")
    )
)]
pub async fn search_history(
    history_service: web::Data<HistoryService>,
    query: web::Query<HistorySearchQuery>,
) -> Result<HttpResponse> {
    match history_service.search(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page.items,
            "searchParams": query.into_inner(),
            "pagination": page.pagination
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/history/{id}",
    tag = "history",
    params(
        ("id" = i64, Path, description = "记录ID")
    ),
    responses(
        (status = 200, description = "删除记录成功"),
        (status = 404, description = "记录不存在")
    )
)]
pub async fn delete_record(
    history_service: web::Data<HistoryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match history_service.delete_record(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "History record deleted successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn history_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/history")
            .route("", web::get().to(list_history))
            .route("/recent", web::get().to(recent_activity))
            .route("/stats", web::get().to(history_stats))
            .route("/search", web::get().to(search_history))
            .route("/user/{user_id}", web::get().to(user_history))
            .route("/{id}", web::delete().to(delete_record))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ClaimService, UserService};
    use crate::stores::{MemoryHistoryStore, MemoryUserStore};
    use crate::utils::ScriptedPointSource;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use std::sync::Arc;

    /// 建两个用户并各领取若干次，返回用户ID
    async fn seeded_services() -> (HistoryService, i64, i64) {
        let users = Arc::new(MemoryUserStore::new());
        let history = Arc::new(MemoryHistoryStore::new());
        let user_service = UserService::new(users.clone(), history.clone());
        let claims = ClaimService::new(
            users.clone(),
            history.clone(),
            Arc::new(ScriptedPointSource::new(vec![2, 5, 9])),
        );
        let a = user_service
            .create_user(CreateUserRequest {
                name: Some("Amit".into()),
            })
            .await
            .unwrap();
        let b = user_service
            .create_user(CreateUserRequest {
                name: Some("Neha".into()),
            })
            .await
            .unwrap();
        claims.claim(a.id).await.unwrap();
        claims.claim(b.id).await.unwrap();
        claims.claim(b.id).await.unwrap();
        (HistoryService::new(users, history), a.id, b.id)
    }

    macro_rules! app {
        ($service:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($service))
                    .service(web::scope("/api").configure(history_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_list_and_recent() {
        let (service, _, _) = seeded_services().await;
        let app = app!(service);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/history?page=1&limit=2")
                .to_request(),
        )
        .await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["pagination"]["totalRecords"], 3);
        assert_eq!(body["pagination"]["total"], 2);
        assert_eq!(body["pagination"]["hasNext"], true);
        // 最新记录在前
        assert_eq!(body["data"][0]["pointsAwarded"], 9);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/history/recent?limit=1")
                .to_request(),
        )
        .await;
        assert_eq!(body["count"], 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/history?page=0")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/history?page=9223372036854775807&limit=100")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_user_history_and_stats() {
        let (service, a, b) = seeded_services().await;
        let app = app!(service);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/history/user/{b}"))
                .to_request(),
        )
        .await;
        assert_eq!(body["data"]["user"]["name"], "Neha");
        assert_eq!(body["data"]["history"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["data"]["stats"]["totalPointsEarned"], 14);
        assert_eq!(body["pagination"]["totalRecords"], 2);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/history/user/12345")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/history/stats").to_request(),
        )
        .await;
        assert_eq!(body["data"]["overall"]["totalClaims"], 3);
        assert_eq!(body["data"]["overall"]["totalPointsAwarded"], 16);
        assert_eq!(body["data"]["leaderboard"][0]["userId"], b);
        assert_eq!(body["data"]["leaderboard"][1]["userId"], a);
        assert!(body["data"]["dailyStats"].is_array());
    }

    #[actix_web::test]
    async fn test_search_and_delete() {
        let (service, a, _) = seeded_services().await;
        let app = app!(service);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/history/search?userName=ami")
                .to_request(),
        )
        .await;
        assert_eq!(body["searchParams"]["userName"], "ami");
        assert_eq!(body["pagination"]["totalRecords"], 1);
        assert_eq!(body["data"][0]["userId"], a);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/history/search?startDate=not-a-date")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let record_id = body["data"][0]["id"].as_i64().unwrap();
        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/history/{record_id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/history/{record_id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
