use anyhow::{Context, Result};
use axum::Router;
use hatchetest_api::{create_app, SERVICE_NAME};
use hatchetest_config::AppConfig;
use hatchetest_errors::HatchetestError;
use hatchetest_worker::{ClientOptions, HatchetClient, TlsStrategy, Worker, WorkerOptions};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

pub const WORKER_NAME: &str = "hatchetest-worker";

/// 主应用程序
pub struct Application {
    config: AppConfig,
    client: HatchetClient,
    worker_options: WorkerOptions,
}

impl Application {
    /// 创建新的应用实例
    ///
    /// 只做配置校验和客户端构建，不绑定任何端口。
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("Hatchet配置无效")?;

        let tls_strategy: TlsStrategy = config.hatchet_tls_strategy.parse()?;
        let (host, port) = config.hatchet_address()?;

        let client = HatchetClient::new(
            ClientOptions::new(config.hatchet_token.clone())
                .with_host_port(host, port)
                .with_server_url(config.hatchet_server_url.clone())
                .with_tls_strategy(tls_strategy),
        )
        .context("创建Hatchet客户端失败")?;

        Ok(Self {
            config,
            client,
            worker_options: WorkerOptions::new(WORKER_NAME),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &HatchetClient {
        &self.client
    }

    pub fn router(&self) -> Router {
        create_app(Some(SERVICE_NAME))
    }

    /// 运行应用直到收到关闭信号
    ///
    /// HTTP服务器在当前任务上运行，Worker在单独的任务中启动；
    /// Worker启动失败只记录日志，不影响HTTP服务。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = self.config.bind_address();
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|e| HatchetestError::Server(format!("绑定地址失败 {bind_address}: {e}")))?;

        info!(
            "HTTP服务器启动在 http://{}:{}",
            self.config.host, self.config.port
        );

        let worker = Worker::new(self.client.clone(), self.worker_options.clone())?;
        let worker_task = tokio::spawn(async move {
            match worker.start().await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("Worker启动失败: {e}");
                    None
                }
            }
        });

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP服务器收到关闭信号");
            })
            .await;

        // Worker的资源只在这里释放
        match worker_task.await {
            Ok(Some(handle)) => {
                if let Err(e) = handle.stop().await {
                    warn!("停止Worker失败: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => error!("Worker启动任务异常退出: {e}"),
        }

        served.context("HTTP服务器运行失败")?;
        info!("HTTP服务器已停止");
        Ok(())
    }
}
