//! Offline analysis over anomaly reports: classifies a report as user UB or
//! compiler defect, and bisects a regression down to a toolchain version or
//! an individual optimization pass.

pub mod collector_client;
pub mod error;
pub mod oracle;
pub mod pass_bisect;
pub mod ub_detector;
pub mod verdict;
pub mod version_bisect;
