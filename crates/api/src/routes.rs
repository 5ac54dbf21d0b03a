use axum::{routing::get, Router};
use std::sync::Arc;

use crate::handlers::health::health_check;

/// API应用状态
#[derive(Clone, Default)]
pub struct AppState {
    pub service_name: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service_name: Option<&str>) -> Self {
        Self {
            service_name: service_name.map(Arc::from),
        }
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .with_state(state)
}
