//! Shared helpers for feedback service integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so
//! the embedded PostgreSQL bootstrap and database provisioning live here.

pub mod pg_embed;

use feedback_service::outbound::persistence::run_pending_migrations;
use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use uuid::Uuid;

/// Returns true when `REQUIRE_TEST_CLUSTER` is set to a truthy value.
///
/// Truthy values: "1", "true", "yes" (case-insensitive).
pub fn require_test_cluster() -> bool {
    std::env::var("REQUIRE_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Handles embedded cluster setup failures consistently across suites.
///
/// Prints a skip marker and returns `None`, unless `REQUIRE_TEST_CLUSTER` is
/// truthy, in which case the failure panics so CI breakage is not masked.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if require_test_cluster() {
        panic!("Test cluster setup failed: {reason}. Unset REQUIRE_TEST_CLUSTER to skip.");
    }
    eprintln!("SKIP-TEST-CLUSTER: {reason}");
    None
}

/// Render a `postgres` error with the SQLSTATE and server message.
///
/// The `Display` implementation collapses database errors to `db error`.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    match error.as_db_error() {
        Some(db_error) => format!(
            "postgres error {:?}: {}",
            db_error.code(),
            db_error.message()
        ),
        None => error.to_string(),
    }
}

/// A freshly created, fully migrated database on a running cluster.
pub struct MigratedDatabase {
    pub url: String,
    _cluster: TestCluster,
}

/// Start a cluster, create a uniquely named database, and migrate it.
///
/// Must be called outside a Tokio runtime; both the cluster bootstrap and
/// the migration harness block.
pub fn migrated_database() -> Result<MigratedDatabase, String> {
    let cluster = pg_embed::test_cluster()?;
    let name = format!("feedback_test_{}", Uuid::new_v4().simple());
    let connection = cluster.connection();

    let mut admin = Client::connect(&connection.database_url("postgres"), NoTls)
        .map_err(|err| format_postgres_error(&err))?;
    admin
        .batch_execute(&format!("CREATE DATABASE \"{name}\""))
        .map_err(|err| format_postgres_error(&err))?;

    let url = connection.database_url(&name);
    run_pending_migrations(&url).map_err(|err| err.to_string())?;
    Ok(MigratedDatabase {
        url,
        _cluster: cluster,
    })
}
