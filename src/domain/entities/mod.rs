pub mod diff;
pub mod fingerprint;
pub mod report;
pub mod row;
