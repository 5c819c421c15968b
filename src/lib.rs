//! AI Manager - referral fraud detection and marketing reporting for the marketplace.
//!
//! # Overview
//!
//! One run of the job scans every referral for abuse, aggregates the
//! performance of sellers' marketing posts, optionally asks a language model
//! for recommendations, and persists a weekly report together with fraud
//! audit entries and per-seller suggestions.
//!
//! # Modules
//!
//! - [`model`]: Referral, marketing, report and suggestion records
//! - [`fraud`]: Mass-signup and self-referral detection
//! - [`aggregation`]: Marketing performance figures
//! - [`insight`]: Optional language-model insights
//! - [`report`]: Report rendering and seller suggestions
//! - [`job`]: Orchestration of one run
//! - [`storage`]: Backend operations and their SQLite implementation
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod fraud;
pub mod insight;
pub mod job;
pub mod model;
pub mod report;
pub mod storage;
