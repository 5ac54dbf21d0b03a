//! # Hatchetest API
//!
//! 基于Axum的HTTP服务，目前只提供健康检查。
//!
//! ## API 端点
//!
//! - `GET /health` - 健康检查
//!
//! ## 中间件
//!
//! - **请求日志**: 记录每个请求的方法、路径、状态和耗时
//! - **追踪**: `TraceLayer`
//! - **异常恢复**: handler panic时返回500而不是断开连接
//! - **CORS**: 允许任意来源
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! # async fn run() -> std::io::Result<()> {
//! let app = hatchetest_api::create_app(Some("hatchetest"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;

pub use routes::{create_routes, AppState};

/// 生产环境健康检查中返回的服务名
pub const SERVICE_NAME: &str = "hatchetest";

/// 创建带完整中间件的应用
///
/// `service_name` 为 `None` 时健康检查只返回状态字段。
pub fn create_app(service_name: Option<&str>) -> Router {
    with_middleware(create_routes(AppState::new(service_name)))
}

/// 为路由加上全部中间件
///
/// 只作用于调用时已存在的路由和fallback。
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(middleware::trace_layer())
        .layer(middleware::catch_panic_layer())
        .layer(middleware::cors_layer())
}
