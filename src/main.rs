use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use hatchetest::app::Application;
use hatchetest::shutdown::ShutdownManager;
use hatchetest_config::AppConfig;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("hatchetest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hatchet Worker与健康检查服务")
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，未指定时使用LOG_LEVEL环境变量")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    // 加载配置
    let config = AppConfig::load().context("加载环境变量配置失败")?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.log_level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");

    // 初始化日志系统
    init_logging(&log_level, log_format)?;

    info!("启动hatchetest服务");

    // 配置错误直接退出
    let app = match Application::new(config) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("应用初始化失败: {e:#}");
            return Err(e);
        }
    };

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    // 启动应用
    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 等待关闭信号，应用提前退出时直接返回其错误
    tokio::select! {
        result = &mut app_handle => {
            let result = result.context("应用任务异常退出").and_then(|r| r);
            match &result {
                Ok(()) => warn!("应用在收到关闭信号前退出"),
                Err(e) => error!("应用运行失败: {e:#}"),
            }
            return result;
        }
        _ = wait_for_shutdown_signal() => {}
    }

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    // 等待应用关闭，设置超时
    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => {
            error!("应用关闭时发生错误: {e:#}");
            return Err(e);
        }
        Ok(Err(e)) => {
            error!("应用任务异常退出: {e}");
            return Err(e.into());
        }
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("hatchetest服务已退出");
    Ok(())
}

/// 初始化日志系统，RUST_LOG优先于LOG_LEVEL
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
