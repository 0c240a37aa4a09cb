use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use chrono::Local;  // timestamp in log lines
use std::sync::Arc;

use leaderboard_backend::{
    config::Config,
    database::{open_stores, seed_default_users},
    handlers,
    middlewares::create_cors,
    services::*,
    swagger::swagger_config,
    utils::RandomPointSource,
};

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {err}");
    std::io::Error::other(format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| startup_error("Failed to load configuration", e))?;

    // 打开存储（数据库模式下会执行迁移）
    let (user_store, history_store) = open_stores(&config.database)
        .await
        .map_err(|e| startup_error("Failed to open stores", e))?;

    // 用户表为空时写入默认用户
    if config.seed.default_users {
        seed_default_users(user_store.as_ref())
            .await
            .map_err(|e| startup_error("Failed to seed default users", e))?;
    }

    let point_source = Arc::new(RandomPointSource::from_seed_option(config.claim.seed));

    // 创建服务
    let user_service = UserService::new(user_store.clone(), history_store.clone());
    let claim_service = ClaimService::new(user_store.clone(), history_store.clone(), point_source);
    let history_service = HistoryService::new(user_store, history_store);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(claim_service.clone()))
            .app_data(web::Data::new(history_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api")
                    .configure(handlers::health_config)
                    .configure(handlers::user_config)
                    .configure(handlers::history_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
