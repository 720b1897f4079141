//! Lead Scraper API Library
//!
//! Turns a free-text place query into a deduplicated, bounded list of business
//! leads pulled from the Google Places API, with summary counts and CSV export.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `collector`: Dedup and bounding of raw listings into leads.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `export`: CSV encoding of lead collections.
//! - `fetcher`: Source-of-listings contract.
//! - `handlers`: HTTP request handlers.
//! - `models`: Lead, Places API and request/response models.
//! - `orchestrator`: Per-session scrape lifecycle.
//! - `services`: Places API client.
//! - `stats`: Summary counts.

pub mod api;
pub mod core;
pub mod integrations;
pub mod obs;

pub mod collector;
pub mod config;
pub mod errors;
pub mod export;
pub mod fetcher;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod stats;
