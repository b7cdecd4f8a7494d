//! Attendance and intervention analytics over loosely structured spreadsheets.
//!
//! [`decode::decode`] turns uploaded bytes into a [`models::Dataset`];
//! [`report::build_report`] turns a dataset into an immutable [`report::Report`].

pub mod aggregate;
pub mod capacity;
pub mod classify;
pub mod clean;
pub mod columns;
pub mod config;
pub mod decode;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod prepare;
pub mod report;
pub mod risk;
pub mod students;

pub use config::{ReportOptions, UploadPolicy};
pub use decode::DecodeError;
pub use report::{build_report, Report, ReportDocument};
