//! # HTTP 服务器
//!
//! Axum 服务器的组装与启动

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::AppContext;
use crate::error::Result;

/// 处理器共享的应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    /// 包装应用上下文
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// HTTP 服务器
pub struct HttpServer {
    addr: SocketAddr,
    router: Router,
}

impl HttpServer {
    /// 组装路由与中间件
    pub fn new(context: Arc<AppContext>) -> Result<Self> {
        let host = context.config.server.host.clone();
        let ip = host
            .parse::<std::net::IpAddr>()
            .map_err(|e| crate::internal_error!("无效的监听地址 '{}': {}", host, e))?;
        let addr = SocketAddr::new(ip, context.config.server.port);

        let state = AppState::new(context);
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderName::from_static("x-api-key"),
            ])
            .allow_origin(Any);

        let router = routes::create_routes(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

        Ok(Self { addr, router })
    }

    /// 绑定并开始服务，直到进程结束
    ///
    /// 限流与用量记录依赖真实的对端地址，必须带 connect-info 启动。
    pub async fn serve(self) -> Result<()> {
        info!("HTTP 服务启动于 {}", self.addr);

        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| crate::internal_error!("HTTP 服务异常退出: {}", e))?;

        Ok(())
    }

    /// 监听地址
    #[must_use]
    pub const fn bind_address(&self) -> SocketAddr {
        self.addr
    }

    /// 测试用：取出组装完成的路由器
    #[cfg(any(test, feature = "testing"))]
    pub fn into_router(self) -> Router {
        self.router
    }
}
