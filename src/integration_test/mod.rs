//! HTTP-level tests which exercise the full router against a real PostgreSQL
//! database. Run with `cargo test --features integration_test` and a
//! TEST_DB_URL environment variable pointing at a postgres server.

mod task_api;
mod test_util;
mod user_api;
