use actix_web::{web, HttpResponse, Result, ResponseError};
use serde_json::json;
use crate::models::*;
use crate::services::{ClaimService, UserService};

#[utoipa::path(
    get,
    path = "/users",
    tag = "user",
    responses(
        (status = 200, description = "按名次获取全部用户", body = [User])
    )
)]
pub async fn list_users(user_service: web::Data<UserService>) -> Result<HttpResponse> {
    match user_service.list_users().await {
        Ok(users) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "count": users.len(),
            "data": users
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "user",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "获取用户详情与领取统计成功"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_user(
    user_service: web::Data<UserService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match user_service.get_user(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "创建用户成功", body = User),
        (status = 400, description = "用户名不合法或已存在")
    )
)]
pub async fn create_user(
    user_service: web::Data<UserService>,
    request: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    match user_service.create_user(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": user,
            "message": "User created successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/users/{id}/claim",
    tag = "user",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "领取积分成功", body = ClaimResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn claim_points(
    claim_service: web::Data<ClaimService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match claim_service.claim(path.into_inner()).await {
        Ok(outcome) => {
            let message = format!(
                "{} points awarded to {}!",
                outcome.points_awarded, outcome.user.name
            );
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": outcome,
                "message": message
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "user",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "修改用户名成功", body = User),
        (status = 400, description = "用户名不合法或已存在"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn rename_user(
    user_service: web::Data<UserService>,
    path: web::Path<i64>,
    request: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    match user_service
        .rename_user(path.into_inner(), request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user,
            "message": "User updated successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "user",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    responses(
        (status = 200, description = "删除用户及其领取记录成功"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn delete_user(
    user_service: web::Data<UserService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match user_service.delete_user(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "User deleted successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/users/reset-all",
    tag = "user",
    responses(
        (status = 200, description = "全部积分清零并清空历史", body = ResetSummary)
    )
)]
pub async fn reset_all(user_service: web::Data<UserService>) -> Result<HttpResponse> {
    match user_service.reset_all().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary,
            "message": "All user points reset successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_user))
            // 固定路径需在 /{id} 之前注册
            .route("/reset-all", web::post().to(reset_all))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(rename_user))
            .route("/{id}", web::delete().to(delete_user))
            .route("/{id}/claim", web::post().to(claim_points))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::HistoryService;
    use crate::stores::{MemoryHistoryStore, MemoryUserStore};
    use crate::utils::ScriptedPointSource;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use std::sync::Arc;

    fn services(script: Vec<i32>) -> (UserService, ClaimService, HistoryService) {
        let users = Arc::new(MemoryUserStore::new());
        let history = Arc::new(MemoryHistoryStore::new());
        (
            UserService::new(users.clone(), history.clone()),
            ClaimService::new(
                users.clone(),
                history.clone(),
                Arc::new(ScriptedPointSource::new(script)),
            ),
            HistoryService::new(users, history),
        )
    }

    macro_rules! app {
        ($script:expr) => {{
            let (users, claims, history) = services($script);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(users))
                    .app_data(web::Data::new(claims))
                    .app_data(web::Data::new(history))
                    .service(
                        web::scope("/api")
                            .configure(user_config)
                            .configure(crate::handlers::history_config),
                    ),
            )
            .await
        }};
    }

    fn create_req(name: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/users")
            .set_json(json!({ "name": name }))
    }

    #[actix_web::test]
    async fn test_create_and_list_users() {
        let app = app!(vec![1]);

        let resp = test::call_service(&app, create_req("Rahul").to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"]["name"], "Rahul");
        assert_eq!(body["data"]["totalPoints"], 0);
        assert_eq!(body["data"]["rank"], 1);

        let resp = test::call_service(&app, create_req("rahul").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let resp = test::call_service(&app, create_req("R").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/users").to_request(),
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["name"], "Rahul");
    }

    #[actix_web::test]
    async fn test_claim_flow() {
        let app = app!(vec![7]);
        let created: Value = test::call_and_read_body_json(&app, create_req("Kamal").to_request()).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/users/{id}/claim"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "7 points awarded to Kamal!");
        assert_eq!(body["data"]["pointsAwarded"], 7);
        assert_eq!(body["data"]["previousTotal"], 0);
        assert_eq!(body["data"]["newTotal"], 7);
        assert_eq!(body["data"]["user"]["totalPoints"], 7);

        let detail: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/users/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(detail["data"]["name"], "Kamal");
        assert_eq!(detail["data"]["stats"]["totalClaims"], 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/users/999/claim")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[actix_web::test]
    async fn test_rename_delete_and_reset() {
        let app = app!(vec![3]);
        let created: Value = test::call_and_read_body_json(&app, create_req("Priya").to_request()).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri(&format!("/api/users/{id}"))
                .set_json(json!({ "name": "Priya S" }))
                .to_request(),
        )
        .await;
        assert_eq!(body["data"]["name"], "Priya S");

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/users/{id}/claim"))
                .to_request(),
        )
        .await;

        // reset-all 不能被 /{id} 路由吞掉
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/users/reset-all")
                .to_request(),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["historyDeleted"], 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/users/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/users/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
