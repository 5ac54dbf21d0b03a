use std::collections::HashMap;

use config::{Config as ConfigBuilder, Environment};
use hatchetest_errors::{HatchetestError, HatchetestResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_HATCHET_HOST_PORT: &str = "localhost:7070";
pub const DEFAULT_TLS_STRATEGY: &str = "tls";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    // 服务配置
    pub port: u16,
    pub host: String,
    pub log_level: String,

    // Hatchet配置
    #[serde(rename = "hatchet_client_server_url", default)]
    pub hatchet_server_url: String,
    #[serde(rename = "hatchet_client_host_port")]
    pub hatchet_host_port: String,
    #[serde(rename = "hatchet_client_token", default)]
    pub hatchet_token: String,
    #[serde(rename = "hatchet_client_tls_strategy")]
    pub hatchet_tls_strategy: String,

    // 数据库配置（预留）
    #[serde(default)]
    pub database_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            hatchet_server_url: String::new(),
            hatchet_host_port: DEFAULT_HATCHET_HOST_PORT.to_string(),
            hatchet_token: String::new(),
            hatchet_tls_strategy: DEFAULT_TLS_STRATEGY.to_string(),
            database_url: String::new(),
        }
    }
}

impl AppConfig {
    /// 从进程环境变量加载配置
    pub fn load() -> HatchetestResult<Self> {
        Self::from_environment(Environment::default())
    }

    /// 从给定的变量表加载配置，键名与环境变量相同
    pub fn from_vars(vars: HashMap<String, String>) -> HatchetestResult<Self> {
        Self::from_environment(Environment::default().source(Some(vars)))
    }

    fn from_environment(environment: Environment) -> HatchetestResult<Self> {
        let settings = ConfigBuilder::builder()
            .set_default("port", i64::from(DEFAULT_PORT))
            .and_then(|b| b.set_default("host", DEFAULT_HOST))
            .and_then(|b| b.set_default("log_level", DEFAULT_LOG_LEVEL))
            .and_then(|b| b.set_default("hatchet_client_host_port", DEFAULT_HATCHET_HOST_PORT))
            .and_then(|b| b.set_default("hatchet_client_tls_strategy", DEFAULT_TLS_STRATEGY))
            .map_err(|e| HatchetestError::config_error(e.to_string()))?
            .add_source(environment)
            .build()
            .map_err(|e| HatchetestError::config_error(format!("读取环境变量失败: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| HatchetestError::config_error(format!("解析配置失败: {e}")))
    }

    /// 校验启动Hatchet客户端所需的配置
    ///
    /// 令牌与服务地址缺失、或 `host:port` 格式错误时返回致命错误。
    pub fn validate(&self) -> HatchetestResult<()> {
        if self.hatchet_token.trim().is_empty() {
            return Err(HatchetestError::MissingSetting("HATCHET_CLIENT_TOKEN"));
        }
        if self.hatchet_server_url.trim().is_empty() {
            return Err(HatchetestError::MissingSetting("HATCHET_CLIENT_SERVER_URL"));
        }
        self.hatchet_address()?;
        Ok(())
    }

    /// 拆分 `HATCHET_CLIENT_HOST_PORT`
    pub fn hatchet_address(&self) -> HatchetestResult<(String, u16)> {
        split_host_port(&self.hatchet_host_port)
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// 解析 `host:port`，支持 `[::1]:7070` 形式的IPv6地址
pub fn split_host_port(value: &str) -> HatchetestResult<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| HatchetestError::invalid_host_port(value, "缺少端口"))?;

    let host = match host.strip_prefix('[') {
        Some(rest) => rest
            .strip_suffix(']')
            .ok_or_else(|| HatchetestError::invalid_host_port(value, "IPv6地址缺少 ']'"))?,
        None if host.contains(':') => {
            return Err(HatchetestError::invalid_host_port(value, "地址中的冒号过多"))
        }
        None => host,
    };

    let port = port
        .parse::<u16>()
        .map_err(|e| HatchetestError::invalid_host_port(value, format!("端口无效: {e}")))?;

    Ok((host.to_string(), port))
}
