//! Helpers shared by the integration tests.

#![allow(dead_code)]

use strongroom::core::{ConfigurationOption, Decision, StaticConfiguration};
use strongroom_testkit::{memory_vault, sqlite_vault, MemoryVault, SqliteVault};

/// Route vault logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Configuration with the given default hierarchy rule.
pub fn with_default(decision: Decision) -> StaticConfiguration {
    StaticConfiguration::new().with(
        ConfigurationOption::DefaultHierarchyAccessRule,
        decision.config_value(),
    )
}

pub fn memory(configuration: StaticConfiguration) -> MemoryVault {
    memory_vault(configuration)
}

pub fn sqlite(configuration: StaticConfiguration) -> SqliteVault {
    sqlite_vault(configuration).expect("open in-memory sqlite")
}

/// Run a generic scenario against both backends.
macro_rules! on_both_backends {
    ($($name:ident),* $(,)?) => {
        mod memory_backend {
            $(
                #[tokio::test]
                async fn $name() -> anyhow::Result<()> {
                    crate::common::init_tracing();
                    super::$name(crate::common::memory).await
                }
            )*
        }

        mod sqlite_backend {
            $(
                #[tokio::test]
                async fn $name() -> anyhow::Result<()> {
                    crate::common::init_tracing();
                    super::$name(crate::common::sqlite).await
                }
            )*
        }
    };
}

pub(crate) use on_both_backends;
