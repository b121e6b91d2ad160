//! REST API over the crawl engine: synchronous crawl/scrape/links endpoints,
//! background runs, API-key authentication and OpenAPI documentation.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
