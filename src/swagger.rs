use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::user::list_users,
        handlers::user::get_user,
        handlers::user::create_user,
        handlers::user::claim_points,
        handlers::user::rename_user,
        handlers::user::delete_user,
        handlers::user::reset_all,
        handlers::history::list_history,
        handlers::history::recent_activity,
        handlers::history::user_history,
        handlers::history::history_stats,
        handlers::history::search_history,
        handlers::history::delete_record,
    ),
    components(
        schemas(
            User,
            CreateUserRequest,
            UpdateUserRequest,
            ClaimResponse,
            ResetSummary,
            HistoryRecord,
            UserClaimStats,
            LeaderboardEntry,
            OverallStats,
            DailyStats,
            HistoryStatsResponse,
            HistoryQuery,
            RecentQuery,
            HistorySearchQuery,
            PaginationInfo,
        )
    ),
    tags(
        (name = "health", description = "Health check API"),
        (name = "user", description = "User and claim API"),
        (name = "history", description = "Claim history API"),
    ),
    info(
        title = "Leaderboard Backend API",
        version = "0.1.0",
        description = "Leaderboard REST API documentation"
    ),
    servers(
        (url = "/api", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
