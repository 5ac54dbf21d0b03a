//! 应用配置
//!
//! 所有配置项在进程启动时从环境变量读取一次，之后不再变化。
//!
//! | 环境变量 | 默认值 |
//! |---|---|
//! | `PORT` | `8080` |
//! | `HOST` | `localhost` |
//! | `LOG_LEVEL` | `info` |
//! | `HATCHET_CLIENT_SERVER_URL` | 必填 |
//! | `HATCHET_CLIENT_HOST_PORT` | `localhost:7070` |
//! | `HATCHET_CLIENT_TOKEN` | 必填 |
//! | `HATCHET_CLIENT_TLS_STRATEGY` | `tls` |
//! | `DATABASE_URL` | 空（预留） |

pub mod app_config;

pub use app_config::{split_host_port, AppConfig};

#[cfg(test)]
mod tests;
