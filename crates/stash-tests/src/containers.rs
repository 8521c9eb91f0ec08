//! Disposable PostgreSQL for the cache repository.

use stash_db::DatabaseConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

const IMAGE_TAG: &str = "16-alpine";
const DB_NAME: &str = "stash";
const DB_USER: &str = "stash";
const DB_PASSWORD: &str = "stash";

/// A running `postgres` container holding an empty `stash` database.
///
/// The container is removed when this value is dropped.
pub struct PostgresContainer {
    _container: ContainerAsync<Postgres>,
    url: String,
}

impl PostgresContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Postgres::default()
            .with_db_name(DB_NAME)
            .with_user(DB_USER)
            .with_password(DB_PASSWORD)
            .with_tag(IMAGE_TAG)
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            DB_USER, DB_PASSWORD, host, port, DB_NAME
        );

        Ok(Self {
            _container: container,
            url,
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.url
    }

    /// Pool settings sized for concurrent-upsert tests.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: 10,
            ..DatabaseConfig::new(self.url.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_container_url_names_stash_database() {
        let pg = PostgresContainer::start().await.unwrap();
        assert!(pg.connection_string().ends_with("/stash"));
        assert_eq!(pg.database_config().max_connections, 10);
    }
}
