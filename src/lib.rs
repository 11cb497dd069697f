//! RAD Enrichment API Library
//!
//! Enriches a B2B lead from its email address: fetches contact, company and
//! news data from third-party providers, resolves them into one profile,
//! infers the buyer context and generates guardrailed marketing copy.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Resolution, inference and generation logic.
//! - `integrations`: Clients for external services.
//! - `cache_validator`: Checksum-sealed cache entries.
//! - `circuit_breaker`: Circuit breaker for model calls.
//! - `config`: Configuration management.
//! - `context_inference`: Buyer-context inference from a profile.
//! - `db`: Database connection and schema bootstrap.
//! - `errors`: Error handling types.
//! - `executive_review`: Executive review generator and specificity judge.
//! - `guardrails`: Content validation, regeneration and fallback.
//! - `handlers`: HTTP request handlers and router.
//! - `keywords`: Keyword-set matching.
//! - `llm_client`: Language model client and retry policy.
//! - `models`: Core data models.
//! - `news_analysis`: Sentiment, entity, AI-stage and crisis scoring of news.
//! - `orchestrator`: Two-phase provider fetch.
//! - `personalization`: Intro and CTA generator.
//! - `pipeline`: End-to-end enrichment flow.
//! - `providers`: Third-party enrichment API clients.
//! - `reference_content`: Curated examples and case studies.
//! - `resolver`: Trust-ranked profile resolution.
//! - `store`: Persistence for payloads, profiles and the news cache.

pub mod api;
pub mod core;
pub mod integrations;

pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod context_inference;
pub mod db;
pub mod errors;
pub mod executive_review;
pub mod guardrails;
pub mod handlers;
pub mod keywords;
pub mod llm_client;
pub mod models;
pub mod news_analysis;
pub mod orchestrator;
pub mod personalization;
pub mod pipeline;
pub mod providers;
pub mod reference_content;
pub mod resolver;
pub mod store;
