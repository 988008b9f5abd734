//! Data quality analysis module.
//!
//! This module measures defects in the raw observations (missing values,
//! negative counts, duplicate keys, implausible spikes, coverage gaps and
//! missing metadata) without changing anything. Remediation is the
//! cleaner's job.

mod analyzer;

pub use analyzer::DataQualityAnalyzer;
