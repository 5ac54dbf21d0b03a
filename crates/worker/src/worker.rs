use std::time::Duration;

use hatchetest_errors::{HatchetestError, HatchetestResult};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::HatchetClient;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker配置
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub name: String,
    pub heartbeat_interval: Duration,
    pub connect_timeout: Duration,
}

impl WorkerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// 注册到Hatchet引擎的Worker
pub struct Worker {
    client: HatchetClient,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(client: HatchetClient, options: WorkerOptions) -> HatchetestResult<Self> {
        if options.name.trim().is_empty() {
            return Err(HatchetestError::worker_error("Worker名称不能为空"));
        }
        if options.heartbeat_interval.is_zero() {
            return Err(HatchetestError::worker_error("心跳间隔必须大于0"));
        }
        Ok(Self { client, options })
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn client(&self) -> &HatchetClient {
        &self.client
    }

    /// 启动Worker
    ///
    /// 先确认引擎gRPC地址可连接，再启动后台心跳任务。
    /// 返回的句柄是释放Worker资源的唯一途径。
    pub async fn start(self) -> HatchetestResult<WorkerHandle> {
        let address = self.client.host_port();
        info!("启动Hatchet Worker: {}，引擎地址: {}", self.options.name, address);

        match timeout(self.options.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => debug!("引擎地址可连接: {address}"),
            Ok(Err(e)) => {
                return Err(HatchetestError::worker_error(format!(
                    "无法连接引擎 {address}: {e}"
                )))
            }
            Err(_) => {
                return Err(HatchetestError::Timeout(format!(
                    "连接引擎 {address} 超过 {:?}",
                    self.options.connect_timeout
                )))
            }
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let name = self.options.name.clone();
        let task = tokio::spawn(run_heartbeat_loop(
            self.client,
            self.options.name,
            self.options.heartbeat_interval,
            shutdown_rx,
        ));

        info!("Hatchet Worker已启动: {name}");
        Ok(WorkerHandle {
            name,
            shutdown_tx,
            task,
        })
    }
}

/// 已启动Worker的句柄
pub struct WorkerHandle {
    name: String,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// 停止Worker并等待后台任务退出
    pub async fn stop(self) -> HatchetestResult<()> {
        info!("停止Hatchet Worker: {}", self.name);

        // 任务已退出时没有接收者，忽略发送错误
        let _ = self.shutdown_tx.send(());

        self.task
            .await
            .map_err(|e| HatchetestError::worker_error(format!("Worker任务异常退出: {e}")))?;

        info!("Hatchet Worker已停止: {}", self.name);
        Ok(())
    }
}

async fn run_heartbeat_loop(
    client: HatchetClient,
    name: String,
    heartbeat_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.recv() => break,
        }

        // 心跳请求本身也要能被停止信号打断
        tokio::select! {
            result = client.health() => match result {
                Ok(()) => debug!("Worker {name} 心跳正常"),
                Err(e) if e.is_retryable() => warn!("Worker {name} 心跳失败: {e}"),
                Err(e) => error!("Worker {name} 心跳异常: {e}"),
            },
            _ = shutdown_rx.recv() => break,
        }
    }

    debug!("Worker {name} 心跳任务已退出");
}
