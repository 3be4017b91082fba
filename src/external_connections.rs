use sqlx::PgConnection;

/// A handle to an active database connection. Lets driven adapters borrow the
/// underlying connection to run queries without caring where it came from.
pub trait ConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// Owns the clients used to communicate with systems external to the app.
/// Business logic receives `&mut impl ExternalConnectivity` so driven adapters
/// can be swapped out for fakes in unit tests.
pub trait ExternalConnectivity: Sync {
    type Handle: ConnectionHandle;
    type Error: Into<anyhow::Error> + Send + Sync + 'static;

    /// Acquires a database connection handle
    async fn database_cxn(&mut self) -> Result<Self::Handle, Self::Error>;
}
