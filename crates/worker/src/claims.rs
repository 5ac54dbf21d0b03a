use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hatchetest_errors::{HatchetestError, HatchetestResult};
use serde::Deserialize;
use uuid::Uuid;

/// Hatchet访问令牌中携带的声明
///
/// 令牌签名由引擎校验，这里只读取载荷。
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// 租户ID
    pub sub: String,
    pub server_url: Option<String>,
    pub grpc_broadcast_address: Option<String>,
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn decode(token: &str) -> HatchetestResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(HatchetestError::invalid_token(format!(
                "令牌应由3段组成，实际为 {} 段",
                segments.len()
            )));
        }

        // 部分签发方会保留填充字符
        let payload = URL_SAFE_NO_PAD
            .decode(segments[1].trim_end_matches('='))
            .map_err(|e| HatchetestError::invalid_token(format!("载荷不是base64url编码: {e}")))?;

        serde_json::from_slice(&payload)
            .map_err(|e| HatchetestError::invalid_token(format!("载荷解析失败: {e}")))
    }

    pub fn tenant_id(&self) -> HatchetestResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| HatchetestError::invalid_token(format!("sub不是有效的租户ID: {e}")))
    }
}
