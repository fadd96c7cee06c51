use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing::debug;

pub async fn get_db_pool(db_url: &str) -> Result<Pool<Sqlite>, sqlx::Error> {
    // every connection to `sqlite::memory:` opens its own empty database,
    // so in-memory pools are pinned to a single long-lived connection
    let in_memory = db_url.contains(":memory:");
    debug!(db_url, in_memory, "opening database pool");

    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    options.connect(db_url).await
}
