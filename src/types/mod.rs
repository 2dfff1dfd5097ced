//! Type definitions for the malaria detection service

pub mod prediction;
pub mod report;

pub use prediction::{EnsembleResult, PredictionResult, Verdict};
pub use report::{ComparisonReport, ConsensusSummary, ModelFailure, PairwiseDisagreement};
