//! # Hatchetest Testing Utils
//!
//! Shared integration-test infrastructure for hatchetest.
//! Starts PostgreSQL and the Hatchet Lite engine in Docker once, hands every
//! test the same connection details and client, and tears everything down
//! at the end.
//!
//! ## Features
//!
//! - **Test Containers**: PostgreSQL and Hatchet Lite on an isolated network
//! - **Token Extraction**: API token from `hatchet-admin` output
//! - **Shared Suite**: process-wide singleton with double-checked initialization
//! - **Test Server**: local HTTP server that accepts routes at runtime
//! - **Fail-soft Teardown**: every cleanup step runs, failures are aggregated
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! hatchetest-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust,no_run
//! use hatchetest_testing_utils::get_or_create_global_shared;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let suite = get_or_create_global_shared().await?;
//! println!("hatchet at {}", suite.hatchet_url);
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod containers;
pub mod server;
pub mod shared;
pub mod singleton;
pub mod token;

pub use cleanup::CleanupErrors;
pub use containers::{HatchetContainer, PostgresContainer, TestNetwork, DEFAULT_TENANT_ID};
pub use server::TestServer;
pub use shared::{
    get_or_create_global_shared, teardown_global_shared, RouteModule, SharedTestSuite,
    SuiteResources,
};
pub use singleton::SharedCell;
pub use token::{extract_token, TOKEN_PATTERN};
