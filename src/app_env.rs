/// URL for accessing the PostgreSQL database (should contain a schema name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. For formatting info, see
/// [EnvFilter's documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Socket address the HTTP server binds to, e.g. `0.0.0.0:8080`
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";

#[cfg(test)]
pub mod test {
    /// URL for accessing the PostgreSQL database during integration tests (should not contain a schema name in the path)
    pub const TEST_DB_URL: &str = "TEST_DB_URL";
}
