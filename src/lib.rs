//! # pokeforge-rs
//!
//! An async Rust client for the PokeForge REST API.
//!
//! This crate implements the cross-cutting core every endpoint wrapper
//! builds on: an HTTP request pipeline with bearer authentication,
//! per-request timeouts, retry with exponential backoff, typed error
//! mapping, and a lazy cursor-based pagination abstraction.
//!
//! ## Features
//!
//! - **Authentication**: static bearer tokens or a per-attempt dynamic
//!   token provider, with manual rotation via `set_token`
//! - **Resilience**: exponential backoff on 429/5xx and transport
//!   failures, `Retry-After` hints honored, timeouts never retried
//! - **Typed errors**: one error variant per failure kind, RFC 7807
//!   problem bodies preserved
//! - **Pagination**: immutable [`Page`] snapshots with lazy `Stream`
//!   traversal across pages
//! - **Async-first**: built on Tokio; calls are cancellable via
//!   `tokio_util::sync::CancellationToken`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pokeforge_rs::{AuthConfig, ClientConfig, PokeForgeClient, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> pokeforge_rs::Result<()> {
//!     let client = PokeForgeClient::new(
//!         ClientConfig::default()
//!             .with_base_url("https://api.pokeforge.gg")
//!             .with_auth(AuthConfig::static_token("your-jwt-token")),
//!     )?;
//!
//!     let descriptor = RequestDescriptor::get("/Cards")
//!         .query("page", 1u32)
//!         .query("pageSize", 20u32)
//!         .query("rarity", vec!["Rare", "HoloRare"]);
//!
//!     let body: Option<serde_json::Value> = client.request(descriptor).await?;
//!     println!("{body:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Pagination
//!
//! List endpoints return a [`Page`] built via [`create_page`]; iterate it
//! lazily or collect everything:
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use pokeforge_rs::Page;
//!
//! # async fn example(page: Page<serde_json::Value>) -> pokeforge_rs::Result<()> {
//! // All items across all pages, fetched as needed.
//! let mut items = page.clone().items();
//! while let Some(item) = items.next().await {
//!     println!("{:?}", item?);
//! }
//!
//! // Or eagerly:
//! let everything = page.to_list().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod error;

// Re-export primary types at crate root for convenience
pub use auth::TokenManager;
pub use client::{
    create_page, AuthConfig, ClientConfig, ConfigOverrides, ListResponse, Page, PageFetcher,
    PageFuture, PageInfo, PageStream, PokeForgeClient, QueryValue, RequestDescriptor, RetryConfig,
    TokenFuture, TokenProvider,
};
pub use error::{Error, ProblemDetails, Result};

/// Prelude module for convenient imports.
///
/// ```rust
/// use pokeforge_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::TokenManager;
    pub use crate::client::{
        create_page, AuthConfig, ClientConfig, ConfigOverrides, ListResponse, Page, PageFetcher,
        PageInfo, PageStream, PokeForgeClient, QueryValue, RequestDescriptor, RetryConfig,
    };
    pub use crate::error::{Error, ProblemDetails, Result};
}
