use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use hatchetest_config::split_host_port;
use hatchetest_errors::{HatchetestError, HatchetestResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, info};
use uuid::Uuid;

use crate::claims::TokenClaims;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 与引擎gRPC端口通信时使用的TLS策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsStrategy {
    None,
    #[default]
    Tls,
    Mtls,
}

impl FromStr for TlsStrategy {
    type Err = HatchetestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(TlsStrategy::None),
            "tls" => Ok(TlsStrategy::Tls),
            "mtls" => Ok(TlsStrategy::Mtls),
            other => Err(HatchetestError::config_error(format!(
                "不支持的TLS策略: {other}"
            ))),
        }
    }
}

impl fmt::Display for TlsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TlsStrategy::None => "none",
            TlsStrategy::Tls => "tls",
            TlsStrategy::Mtls => "mtls",
        };
        f.write_str(s)
    }
}

/// 客户端构建选项
///
/// 未设置的地址会从令牌声明中补全。
#[derive(Clone)]
pub struct ClientOptions {
    token: String,
    host_port: Option<(String, u16)>,
    server_url: Option<String>,
    tls_strategy: TlsStrategy,
    request_timeout: Duration,
}

impl ClientOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host_port: None,
            server_url: None,
            tls_strategy: TlsStrategy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_host_port(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host_port = Some((host.into(), port));
        self
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    pub fn with_tls_strategy(mut self, tls_strategy: TlsStrategy) -> Self {
        self.tls_strategy = tls_strategy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("token", &"<redacted>")
            .field("host_port", &self.host_port)
            .field("server_url", &self.server_url)
            .field("tls_strategy", &self.tls_strategy)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Hatchet客户端
///
/// 克隆开销很小，所有克隆共享同一个HTTP连接池。
#[derive(Clone)]
pub struct HatchetClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    tenant_id: Uuid,
    host: String,
    port: u16,
    server_url: String,
    tls_strategy: TlsStrategy,
    http: reqwest::Client,
}

impl HatchetClient {
    pub fn new(options: ClientOptions) -> HatchetestResult<Self> {
        let claims = TokenClaims::decode(&options.token)?;
        let tenant_id = claims.tenant_id()?;

        let (host, port) = match options.host_port {
            Some(host_port) => host_port,
            None => {
                let address = claims.grpc_broadcast_address.as_deref().ok_or_else(|| {
                    HatchetestError::client_error("未指定引擎地址，令牌中也没有grpc_broadcast_address")
                })?;
                split_host_port(address)?
            }
        };

        let server_url = options
            .server_url
            .or(claims.server_url)
            .ok_or_else(|| {
                HatchetestError::client_error("未指定服务地址，令牌中也没有server_url")
            })?
            .trim_end_matches('/')
            .to_string();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", options.token))
            .map_err(|e| HatchetestError::invalid_token(format!("令牌包含非法字符: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| HatchetestError::client_error(format!("创建HTTP客户端失败: {e}")))?;

        info!(
            tenant_id = %tenant_id,
            host = %host,
            port,
            server_url = %server_url,
            tls_strategy = %options.tls_strategy,
            "Hatchet客户端已创建"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                tenant_id,
                host,
                port,
                server_url,
                tls_strategy: options.tls_strategy,
                http,
            }),
        })
    }

    pub fn tenant_id(&self) -> Uuid {
        self.inner.tenant_id
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// 引擎gRPC地址，`host:port`
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.inner.host, self.inner.port)
    }

    pub fn server_url(&self) -> &str {
        &self.inner.server_url
    }

    pub fn tls_strategy(&self) -> TlsStrategy {
        self.inner.tls_strategy
    }

    pub fn grpc_endpoint(&self) -> String {
        let scheme = match self.inner.tls_strategy {
            TlsStrategy::None => "http",
            TlsStrategy::Tls | TlsStrategy::Mtls => "https",
        };
        format!("{scheme}://{}", self.host_port())
    }

    /// 查询引擎健康状态
    pub async fn health(&self) -> HatchetestResult<()> {
        let url = format!("{}/health", self.inner.server_url);
        debug!("检查Hatchet健康状态: {url}");

        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HatchetestError::Network(format!("请求 {url} 失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HatchetestError::Network(format!(
                "Hatchet健康检查失败，状态码: {status}"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for HatchetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HatchetClient")
            .field("tenant_id", &self.inner.tenant_id)
            .field("host_port", &self.host_port())
            .field("server_url", &self.inner.server_url)
            .field("tls_strategy", &self.inner.tls_strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::test_tokens::{token_with_claims, TENANT_ID};
    use axum::{http::StatusCode, routing::get, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    fn tenant_token() -> String {
        token_with_claims(json!({ "sub": TENANT_ID }))
    }

    async fn spawn_health_server(status: StatusCode) -> String {
        let app = Router::new().route("/health", get(move || async move { status }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        address
    }

    #[test]
    fn test_tls_strategy_parsing() {
        assert_eq!("none".parse::<TlsStrategy>().unwrap(), TlsStrategy::None);
        assert_eq!("TLS".parse::<TlsStrategy>().unwrap(), TlsStrategy::Tls);
        assert_eq!(" mtls ".parse::<TlsStrategy>().unwrap(), TlsStrategy::Mtls);
        assert!("plaintext".parse::<TlsStrategy>().is_err());
        assert_eq!(TlsStrategy::None.to_string(), "none");
    }

    #[test]
    fn test_client_with_explicit_options() {
        let client = HatchetClient::new(
            ClientOptions::new(tenant_token())
                .with_host_port("localhost", 7077)
                .with_server_url("http://localhost:8888/")
                .with_tls_strategy(TlsStrategy::None),
        )
        .unwrap();

        assert_eq!(client.tenant_id().to_string(), TENANT_ID);
        assert_eq!(client.host(), "localhost");
        assert_eq!(client.port(), 7077);
        assert_eq!(client.host_port(), "localhost:7077");
        assert_eq!(client.server_url(), "http://localhost:8888");
        assert_eq!(client.grpc_endpoint(), "http://localhost:7077");
    }

    #[test]
    fn test_client_falls_back_to_token_claims() {
        let token = token_with_claims(json!({
            "sub": TENANT_ID,
            "server_url": "http://engine:8888",
            "grpc_broadcast_address": "engine:7077"
        }));

        let client = HatchetClient::new(ClientOptions::new(token)).unwrap();
        assert_eq!(client.host_port(), "engine:7077");
        assert_eq!(client.server_url(), "http://engine:8888");
        assert_eq!(client.tls_strategy(), TlsStrategy::Tls);
        assert_eq!(client.grpc_endpoint(), "https://engine:7077");
    }

    #[test]
    fn test_explicit_options_win_over_claims() {
        let token = token_with_claims(json!({
            "sub": TENANT_ID,
            "server_url": "http://engine:8888",
            "grpc_broadcast_address": "engine:7077"
        }));

        let client = HatchetClient::new(
            ClientOptions::new(token)
                .with_host_port("127.0.0.1", 32768)
                .with_server_url("http://127.0.0.1:32769"),
        )
        .unwrap();
        assert_eq!(client.host_port(), "127.0.0.1:32768");
        assert_eq!(client.server_url(), "http://127.0.0.1:32769");
    }

    #[test]
    fn test_client_requires_an_address() {
        let result = HatchetClient::new(
            ClientOptions::new(tenant_token()).with_server_url("http://localhost:8888"),
        );
        assert!(matches!(result, Err(HatchetestError::Client(_))));

        let result =
            HatchetClient::new(ClientOptions::new(tenant_token()).with_host_port("localhost", 7077));
        assert!(matches!(result, Err(HatchetestError::Client(_))));
    }

    #[test]
    fn test_client_rejects_invalid_token() {
        let result = HatchetClient::new(
            ClientOptions::new("test-token-for-integration")
                .with_host_port("localhost", 7077)
                .with_server_url("http://localhost:8888"),
        );
        assert!(matches!(result, Err(HatchetestError::InvalidToken(_))));
    }

    #[test]
    fn test_options_debug_redacts_token() {
        let options = ClientOptions::new(tenant_token());
        let rendered = format!("{options:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("eyJ"));
    }

    #[tokio::test]
    async fn test_health_check_against_engine() {
        let healthy = spawn_health_server(StatusCode::OK).await;
        let client = HatchetClient::new(
            ClientOptions::new(tenant_token())
                .with_host_port("localhost", 7077)
                .with_server_url(healthy),
        )
        .unwrap();
        assert!(client.health().await.is_ok());

        let unhealthy = spawn_health_server(StatusCode::SERVICE_UNAVAILABLE).await;
        let client = HatchetClient::new(
            ClientOptions::new(tenant_token())
                .with_host_port("localhost", 7077)
                .with_server_url(unhealthy),
        )
        .unwrap();
        assert!(matches!(
            client.health().await,
            Err(HatchetestError::Network(_))
        ));
    }
}
