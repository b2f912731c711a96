//! Repository implementations.
//!
//! # Repositories
//!
//! - [`PgShortUrlRepository`] / [`MemoryShortUrlRepository`] - Short URL records
//! - [`PgClickRepository`] / [`MemoryClickRepository`] - Click log
//!
//! PostgreSQL queries are runtime-checked (`query_as` with `FromRow` rows), so the
//! crate builds without a database or an offline query cache.

pub mod memory_click_repository;
pub mod memory_short_url_repository;
pub mod pg_click_repository;
pub mod pg_short_url_repository;

pub use memory_click_repository::MemoryClickRepository;
pub use memory_short_url_repository::MemoryShortUrlRepository;
pub use pg_click_repository::PgClickRepository;
pub use pg_short_url_repository::PgShortUrlRepository;
