/// Database utilities
///
/// - `pool`: PostgreSQL connection pool creation
/// - `migrations`: migration runner backed by `sqlx::migrate!`

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{create_pool, DatabaseConfig};
