//! Shared container suite: one database, one engine, one test server.
//!
//! Two entry points start the same infrastructure:
//!
//! - [`SharedTestSuite::setup_suite`] returns an owned suite for a single
//!   suite-style test that tears it down itself.
//! - [`get_or_create_global_shared`] returns the process-wide instance, created
//!   by the first caller and reused by every later one.

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use hatchetest_config::AppConfig;
use hatchetest_errors::{HatchetestError, HatchetestResult};
use hatchetest_worker::{ClientOptions, HatchetClient, TlsStrategy};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::OnceCell;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::cleanup::CleanupErrors;
use crate::containers::{HatchetContainer, PostgresContainer, TestNetwork, DEFAULT_TENANT_ID};
use crate::server::TestServer;
use crate::singleton::SharedCell;

const SUITE_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);
const SHARED_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

pub const TEST_CONFIG_PORT: u16 = 8081;
pub const TEST_CONFIG_HOST: &str = "localhost";

/// Mounts routes on the shared test server.
pub type RouteModule = fn(Router, &HatchetClient, &AppConfig) -> Router;

/// Everything a suite owns that must be released on teardown.
///
/// Fields are filled in startup order, so a failed startup holds exactly the
/// resources that were created before the failure.
#[derive(Default)]
pub struct SuiteResources {
    network: Option<TestNetwork>,
    postgres: Option<PostgresContainer>,
    hatchet: Option<HatchetContainer>,
    server: OnceCell<TestServer>,
}

impl SuiteResources {
    pub fn with_network(network: TestNetwork) -> Self {
        Self {
            network: Some(network),
            ..Self::default()
        }
    }

    /// Releases in reverse startup order. Every step runs; failures are aggregated.
    pub async fn release(self) -> HatchetestResult<()> {
        let mut errors = CleanupErrors::new();

        if let Some(server) = self.server.into_inner() {
            errors.record("test server shutdown", server.shutdown().await);
        }
        if let Some(hatchet) = self.hatchet {
            errors.record("hatchet container", hatchet.terminate().await);
        }
        if let Some(postgres) = self.postgres {
            errors.record("postgres container", postgres.terminate().await);
        }
        if let Some(network) = self.network {
            errors.record("network removal", network.remove().await);
        }

        errors.into_result()
    }
}

struct Connection {
    postgres_url: String,
    hatchet_url: String,
    hatchet_grpc_url: String,
    hatchet_token: String,
    hatchet_client: HatchetClient,
}

/// Running test infrastructure and the connection details derived from it.
pub struct SharedTestSuite {
    resources: SuiteResources,
    pub postgres_url: String,
    pub hatchet_url: String,
    pub hatchet_grpc_url: String,
    pub hatchet_token: String,
    pub hatchet_client: HatchetClient,
}

impl SharedTestSuite {
    /// Owned suite for a single suite-style test.
    pub async fn setup_suite() -> Result<Self> {
        Self::start(SUITE_STARTUP_TIMEOUT).await
    }

    /// Containers and client only; the test server starts on first use.
    pub async fn setup_containers_only() -> Result<Self> {
        Self::start(SHARED_STARTUP_TIMEOUT).await
    }

    async fn start(startup_timeout: Duration) -> Result<Self> {
        let network = TestNetwork::create()
            .await
            .context("Failed to create test network")?;
        info!("Setting up shared test suite on network {}", network.name());

        let mut resources = SuiteResources::with_network(network.clone());
        match boot(&network, &mut resources, startup_timeout).await {
            Ok(connection) => {
                info!("Shared test suite ready, hatchet at {}", connection.hatchet_url);
                Ok(Self {
                    resources,
                    postgres_url: connection.postgres_url,
                    hatchet_url: connection.hatchet_url,
                    hatchet_grpc_url: connection.hatchet_grpc_url,
                    hatchet_token: connection.hatchet_token,
                    hatchet_client: connection.hatchet_client,
                })
            }
            Err(e) => {
                warn!("Shared test suite setup failed, releasing partial resources: {:#}", e);
                if let Err(cleanup) = resources.release().await {
                    warn!("Partial cleanup after failed setup: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// The local test server, started on first call.
    pub async fn test_server(&self) -> Result<&TestServer> {
        self.resources.server.get_or_try_init(TestServer::start).await
    }

    pub async fn test_server_url(&self) -> Result<String> {
        Ok(self.test_server().await?.url().to_string())
    }

    /// Application settings pointing at this suite's engine.
    pub fn test_config(&self) -> AppConfig {
        AppConfig {
            port: TEST_CONFIG_PORT,
            host: TEST_CONFIG_HOST.to_string(),
            hatchet_server_url: self.hatchet_url.clone(),
            hatchet_host_port: self.hatchet_grpc_url.clone(),
            hatchet_token: self.hatchet_token.clone(),
            hatchet_tls_strategy: TlsStrategy::None.to_string(),
            database_url: self.postgres_url.clone(),
            ..AppConfig::default()
        }
    }

    /// Mounts `modules` on the running test server, starting it if needed.
    pub async fn register_modules(&self, modules: &[RouteModule]) -> Result<()> {
        let server = self.test_server().await?;
        let config = self.test_config();
        let client = &self.hatchet_client;

        server
            .register(|router| {
                modules
                    .iter()
                    .fold(router, |router, module| module(router, client, &config))
            })
            .await;

        debug!("Registered {} route module(s) on {}", modules.len(), server.url());
        Ok(())
    }

    pub async fn teardown(self) -> HatchetestResult<()> {
        info!("Tearing down shared test suite");
        self.resources.release().await
    }
}

async fn boot(
    network: &TestNetwork,
    resources: &mut SuiteResources,
    startup_timeout: Duration,
) -> Result<Connection> {
    let postgres = PostgresContainer::start(network, startup_timeout)
        .await
        .map_err(|e| HatchetestError::container_error(format!("{e:#}")))?;
    let postgres_url = postgres.url.clone();
    let internal_url = postgres.internal_url.clone();
    resources.postgres = Some(postgres);

    let hatchet = HatchetContainer::start(network, &internal_url, startup_timeout)
        .await
        .map_err(|e| HatchetestError::container_error(format!("{e:#}")))?;
    let hatchet = resources.hatchet.insert(hatchet);

    let hatchet_url = hatchet.http_url();
    let hatchet_grpc_url = hatchet.grpc_address();
    hatchet.verify_health().await?;

    let hatchet_token = hatchet
        .issue_token(DEFAULT_TENANT_ID)
        .await
        .context("Failed to issue hatchet token")?;

    std::env::set_var("HATCHET_CLIENT_TOKEN", &hatchet_token);
    std::env::set_var("HATCHET_CLIENT_HOST_PORT", &hatchet_grpc_url);
    std::env::set_var("HATCHET_CLIENT_SERVER_URL", &hatchet_url);
    std::env::set_var("HATCHET_CLIENT_TLS_STRATEGY", TlsStrategy::None.to_string());

    let hatchet_client = HatchetClient::new(
        ClientOptions::new(hatchet_token.clone())
            .with_host_port(hatchet.host(), hatchet.grpc_port())
            .with_server_url(hatchet_url.clone())
            .with_tls_strategy(TlsStrategy::None),
    )
    .context("Failed to create hatchet client")?;

    Ok(Connection {
        postgres_url,
        hatchet_url,
        hatchet_grpc_url,
        hatchet_token,
        hatchet_client,
    })
}

static GLOBAL_SUITE: LazyLock<SharedCell<SharedTestSuite>> = LazyLock::new(SharedCell::new);

// Each #[tokio::test] gets its own runtime; the global suite must outlive all of them.
static HARNESS_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("hatchetest-harness")
        .enable_all()
        .build()
        .expect("failed to build test harness runtime")
});

/// Drives `make()` to completion on the harness runtime from a blocking thread.
///
/// `block_on` does not require the future to be `Send`; container exec results
/// are not `Sync`, so startup futures never are.
async fn on_harness_runtime<F, Fut, T>(make: F) -> Result<T, JoinError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T>,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || HARNESS_RUNTIME.block_on(make())).await
}

/// Returns the process-wide suite, creating it on first call.
///
/// Concurrent first callers wait for a single startup and all receive the same
/// instance. A failed startup is returned to every waiting caller and nothing
/// is cached, so a later call retries.
pub async fn get_or_create_global_shared() -> Result<Arc<SharedTestSuite>> {
    if let Some(suite) = GLOBAL_SUITE.get().await {
        debug!("Reusing global shared test suite");
        return Ok(suite);
    }

    on_harness_runtime(|| async {
        GLOBAL_SUITE
            .get_or_try_init(|| async {
                info!("Creating global shared test suite");
                let suite = SharedTestSuite::setup_containers_only().await?;

                let started = suite.test_server().await.map(|_| ());
                if let Err(e) = started {
                    if let Err(cleanup) = suite.teardown().await {
                        warn!("Cleanup after failed test server start: {}", cleanup);
                    }
                    return Err(e);
                }
                Ok::<_, anyhow::Error>(suite)
            })
            .await
    })
    .await
    .context("global shared suite setup task panicked")?
}

/// Removes the global suite and releases its containers.
///
/// Fails while any other handle to the suite is still alive; the suite then
/// stays registered. Without a global suite this is a no-op.
pub async fn teardown_global_shared() -> HatchetestResult<()> {
    let suite = GLOBAL_SUITE.take_unique().await.map_err(|others| {
        HatchetestError::Internal(format!(
            "global shared suite is still held by {others} other handle(s)"
        ))
    })?;
    let Some(suite) = suite else {
        debug!("No global shared test suite to tear down");
        return Ok(());
    };

    on_harness_runtime(move || suite.teardown())
        .await
        .map_err(|e| HatchetestError::Internal(format!("global suite teardown task failed: {e}")))?
}
