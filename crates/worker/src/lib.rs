//! # Hatchetest Worker
//!
//! Hatchet工作流引擎的客户端与Worker封装。
//!
//! - [`HatchetClient`]: 根据访问令牌和引擎地址构建的客户端
//! - [`Worker`] / [`WorkerHandle`]: 显式管理生命周期的Worker，
//!   资源只在调用 [`WorkerHandle::stop`] 时释放
//!
//! 引擎的调度协议与任务执行不在本crate范围内。

pub mod claims;
pub mod client;
pub mod worker;

pub use claims::TokenClaims;
pub use client::{ClientOptions, HatchetClient, TlsStrategy};
pub use worker::{Worker, WorkerHandle, WorkerOptions};
