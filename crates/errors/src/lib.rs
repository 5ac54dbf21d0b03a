use thiserror::Error;

#[derive(Debug, Error)]
pub enum HatchetestError {
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("缺少必需的配置项: {0}")]
    MissingSetting(&'static str),
    #[error("无效的地址 {value}: {reason}")]
    InvalidHostPort { value: String, reason: String },
    #[error("无效的访问令牌: {0}")]
    InvalidToken(String),
    #[error("Hatchet客户端错误: {0}")]
    Client(String),
    #[error("Worker错误: {0}")]
    Worker(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("HTTP服务错误: {0}")]
    Server(String),
    #[error("测试容器错误: {0}")]
    Container(String),
    #[error("令牌提取失败: {0}")]
    TokenExtraction(String),
    #[error("清理失败: {}", .0.join("; "))]
    Cleanup(Vec<String>),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type HatchetestResult<T> = Result<T, HatchetestError>;

impl HatchetestError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn invalid_host_port<V: Into<String>, R: Into<String>>(value: V, reason: R) -> Self {
        Self::InvalidHostPort {
            value: value.into(),
            reason: reason.into(),
        }
    }
    pub fn invalid_token<S: Into<String>>(msg: S) -> Self {
        Self::InvalidToken(msg.into())
    }
    pub fn client_error<S: Into<String>>(msg: S) -> Self {
        Self::Client(msg.into())
    }
    pub fn worker_error<S: Into<String>>(msg: S) -> Self {
        Self::Worker(msg.into())
    }
    pub fn container_error<S: Into<String>>(msg: S) -> Self {
        Self::Container(msg.into())
    }

    /// 可重试的运行时错误，调用方只记录警告
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HatchetestError::Network(_) | HatchetestError::Timeout(_) | HatchetestError::Io(_)
        )
    }
}
