//! Test container utilities for integration testing
//!
//! Starts the PostgreSQL database and the Hatchet Lite engine on a shared
//! Docker network. The engine reaches the database through its network alias;
//! tests reach both through the mapped host ports.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use testcontainers::bollard::network::CreateNetworkOptions;
use testcontainers::core::client::docker_client_instance;
use testcontainers::core::wait::HttpWaitStrategy;
use testcontainers::core::{CmdWaitFor, ExecCommand, IntoContainerPort, WaitFor};
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::token::extract_token;

pub const POSTGRES_TAG: &str = "15-alpine";
pub const POSTGRES_DB: &str = "hatchet";
pub const POSTGRES_USER: &str = "hatchet";
pub const POSTGRES_PASSWORD: &str = "hatchet";
pub const POSTGRES_PORT: u16 = 5432;

pub const HATCHET_IMAGE: &str = "ghcr.io/hatchet-dev/hatchet/hatchet-lite";
pub const HATCHET_TAG: &str = "latest";
pub const HATCHET_HTTP_PORT: u16 = 8888;
pub const HATCHET_GRPC_PORT: u16 = 7077;

/// Tenant seeded by hatchet-lite on first boot.
pub const DEFAULT_TENANT_ID: &str = "707d0855-80ab-4e1f-a156-f1c4546cbf52";

/// Isolated network shared by the database and the engine.
///
/// Created up front so it exists before any container joins it. testcontainers
/// leaves networks it did not create alone, so [`TestNetwork::remove`] is the
/// only release path.
#[derive(Debug, Clone)]
pub struct TestNetwork {
    name: String,
}

impl TestNetwork {
    /// Creates a uniquely named bridge network.
    pub async fn create() -> Result<Self> {
        let network = Self::named(unique_network_name());

        let docker = docker_client_instance()
            .await
            .context("Failed to connect to docker")?;
        docker
            .create_network(CreateNetworkOptions {
                name: network.name.clone(),
                check_duplicate: true,
                driver: "bridge".to_string(),
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to create network {}", network.name))?;

        info!("Created test network {}", network.name);
        Ok(network)
    }

    /// Handle for an existing network; nothing is created.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container name for `service`, resolvable as a hostname inside the network.
    pub fn alias(&self, service: &str) -> String {
        format!("{}-{}", service, self.name)
    }

    /// Removes the network. Fails while containers are still attached.
    pub async fn remove(self) -> Result<()> {
        debug!("Removing test network {}", self.name);

        let docker = docker_client_instance()
            .await
            .context("Failed to connect to docker")?;
        docker
            .remove_network(&self.name)
            .await
            .with_context(|| format!("Failed to remove network {}", self.name))
    }
}

/// `hatchet-test-network-<unix nanos>`, unique per call on one machine.
fn unique_network_name() -> String {
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("hatchet-test-network-{suffix}")
}

/// PostgreSQL test container
pub struct PostgresContainer {
    container: ContainerAsync<Postgres>,
    /// Reachable from the test process through the mapped port.
    pub url: String,
    /// Reachable from other containers on the same network.
    pub internal_url: String,
}

impl PostgresContainer {
    /// Start PostgreSQL on `network`
    ///
    /// This will:
    /// 1. Start the container and wait for "database system is ready to accept connections"
    /// 2. Confirm the mapped port accepts connections
    pub async fn start(network: &TestNetwork, startup_timeout: Duration) -> Result<Self> {
        let alias = network.alias("postgres");

        let container = Postgres::default()
            .with_db_name(POSTGRES_DB)
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_tag(POSTGRES_TAG)
            .with_network(network.name())
            .with_container_name(alias.clone())
            .with_startup_timeout(startup_timeout)
            .start()
            .await
            .context("Failed to start postgres container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get postgres host")?;
        let port = container
            .get_host_port_ipv4(POSTGRES_PORT.tcp())
            .await
            .context("Failed to get postgres port")?;

        let url = postgres_url(&host.to_string(), port);
        let internal_url = postgres_url(&alias, POSTGRES_PORT);

        wait_for_postgres(&url).await?;
        info!("Postgres container ready at {}:{}", host, port);

        Ok(Self {
            container,
            url,
            internal_url,
        })
    }

    pub async fn terminate(self) -> Result<()> {
        self.container
            .rm()
            .await
            .context("Failed to terminate postgres container")
    }
}

fn postgres_url(host: &str, port: u16) -> String {
    format!(
        "postgres://{POSTGRES_USER}:{POSTGRES_PASSWORD}@{host}:{port}/{POSTGRES_DB}?sslmode=disable"
    )
}

async fn wait_for_postgres(database_url: &str) -> Result<()> {
    // Retry connection with backoff
    let mut retry_count = 0;
    let pool = loop {
        match PgPool::connect(database_url).await {
            Ok(pool) => break pool,
            Err(_) if retry_count < 30 => {
                retry_count += 1;
                sleep(Duration::from_millis(500)).await;
                continue;
            }
            Err(e) => return Err(e).context("Postgres port never accepted connections"),
        }
    };
    pool.close().await;
    Ok(())
}

/// Hatchet Lite engine container
pub struct HatchetContainer {
    container: ContainerAsync<GenericImage>,
    host: String,
    http_port: u16,
    grpc_port: u16,
}

impl HatchetContainer {
    /// Start the engine on `network`, pointed at `database_url`.
    ///
    /// Returns once `GET /health` on the HTTP port answers 200.
    pub async fn start(
        network: &TestNetwork,
        database_url: &str,
        startup_timeout: Duration,
    ) -> Result<Self> {
        let image = GenericImage::new(HATCHET_IMAGE, HATCHET_TAG)
            .with_exposed_port(HATCHET_HTTP_PORT.tcp())
            .with_exposed_port(HATCHET_GRPC_PORT.tcp())
            .with_wait_for(WaitFor::http(
                HttpWaitStrategy::new("/health")
                    .with_port(HATCHET_HTTP_PORT.tcp())
                    .with_expected_status_code(200_u16),
            ));

        let mut request = image
            .with_network(network.name())
            .with_startup_timeout(startup_timeout);
        for (key, value) in hatchet_env(database_url) {
            request = request.with_env_var(key, value);
        }

        let container = request
            .start()
            .await
            .context("Failed to start hatchet container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get hatchet host")?
            .to_string();
        let grpc_port = container
            .get_host_port_ipv4(HATCHET_GRPC_PORT.tcp())
            .await
            .context("Failed to get hatchet GRPC port")?;
        let http_port = container
            .get_host_port_ipv4(HATCHET_HTTP_PORT.tcp())
            .await
            .context("Failed to get hatchet HTTP port")?;

        Ok(Self {
            container,
            host,
            http_port,
            grpc_port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn grpc_port(&self) -> u16 {
        self.grpc_port
    }

    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }

    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    /// Queries `/health` directly, independent of the startup wait strategy.
    pub async fn verify_health(&self) -> Result<()> {
        let url = format!("{}/health", self.http_url());
        let response = reqwest::get(&url)
            .await
            .context("Failed to check hatchet health")?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            bail!("Hatchet health check failed with status: {}", status);
        }
        Ok(())
    }

    /// Mints an API token for `tenant_id` with `hatchet-admin` inside the container.
    pub async fn issue_token(&self, tenant_id: &str) -> Result<String> {
        let mut result = self
            .container
            .exec(
                ExecCommand::new([
                    "/hatchet-admin",
                    "token",
                    "create",
                    "--config",
                    "/config",
                    "--tenant-id",
                    tenant_id,
                ])
                .with_cmd_ready_condition(CmdWaitFor::exit()),
            )
            .await
            .context("Failed to execute token creation command")?;

        let stdout = result.stdout_to_vec().await?;
        let stderr = result.stderr_to_vec().await?;
        let exit_code = result.exit_code().await?;
        if exit_code != Some(0) {
            bail!(
                "Token creation command failed, exit code: {:?}, stderr: {}",
                exit_code,
                String::from_utf8_lossy(&stderr)
            );
        }

        let output = format!(
            "{}\n{}",
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr)
        );
        Ok(extract_token(output.trim())?)
    }

    pub async fn terminate(self) -> Result<()> {
        self.container
            .rm()
            .await
            .context("Failed to terminate hatchet container")
    }
}

fn hatchet_env(database_url: &str) -> Vec<(&'static str, String)> {
    let grpc_broadcast = format!("localhost:{HATCHET_GRPC_PORT}");
    vec![
        ("DATABASE_URL", database_url.to_string()),
        ("SERVER_AUTH_COOKIE_DOMAIN", "localhost".to_string()),
        ("SERVER_AUTH_COOKIE_INSECURE", "t".to_string()),
        ("SERVER_GRPC_BIND_ADDRESS", "0.0.0.0".to_string()),
        ("SERVER_GRPC_INSECURE", "t".to_string()),
        ("SERVER_GRPC_BROADCAST_ADDRESS", grpc_broadcast.clone()),
        ("SERVER_GRPC_PORT", HATCHET_GRPC_PORT.to_string()),
        ("SERVER_HTTP_PORT", HATCHET_HTTP_PORT.to_string()),
        ("SERVER_URL", format!("http://localhost:{HATCHET_HTTP_PORT}")),
        ("SERVER_AUTH_SET_EMAIL_VERIFIED", "t".to_string()),
        ("SERVER_DEFAULT_ENGINE_VERSION", "V1".to_string()),
        (
            "SERVER_INTERNAL_CLIENT_INTERNAL_GRPC_BROADCAST_ADDRESS",
            grpc_broadcast,
        ),
    ]
}
