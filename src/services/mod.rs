//! Service layer for the synchronization engine.
//!
//! This module contains the local data preparation steps:
//! - Grid extraction from saved pages (`GridExtractor`)
//! - Table cleaning and typing (`TableNormalizer`)
//! - Equivalence grade derivation (`EquivalenceResolver`)

pub mod equivalence;
pub mod extract;
pub mod normalizer;

pub use equivalence::EquivalenceResolver;
pub use extract::{GridExtractor, read_grid};
pub use normalizer::TableNormalizer;
