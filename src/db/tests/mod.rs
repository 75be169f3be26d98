//! Repository tests against real PostgreSQL.
//!
//! Each repository has a test module containing shared test functions
//! that take `&dyn XxxRepo`, wrapped by PostgreSQL-specific setup using
//! testcontainers (marked `#[ignore]`).
//!
//! ```bash
//! cargo test                # Fast in-process tests only
//! cargo test -- --ignored   # PostgreSQL integration tests (requires Docker)
//! ```

pub mod harness;
mod locks;
