// patternloop-config/src/lib.rs
// ============================================================================
// Module: PatternLoop Config Library
// Description: Canonical config model, validation, and doc generation.
// Purpose: Single source of truth for patternloop.toml semantics.
// Dependencies: patternloop-core, patternloop-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `patternloop-config` defines the canonical configuration model for
//! PatternLoop: storage, scoring, clustering, crawler, and coaching session
//! settings. It provides strict, fail-closed validation and a deterministic
//! docs generator.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod docs;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use docs::config_docs_markdown;
pub use docs::verify_config_docs;
pub use docs::write_config_docs;
pub use examples::config_toml_example;
