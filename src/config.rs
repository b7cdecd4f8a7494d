use std::path::Path;

use crate::decode::DecodeError;

/// Size bounds for the lists carried in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub top_reasons: usize,
    pub top_students_global: usize,
    pub top_students_per_module: usize,
    pub repeated_students: usize,
    pub repeated_preview_rows: usize,
    pub sample_rows: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_reasons: 15,
            top_students_global: 200,
            top_students_per_module: 100,
            repeated_students: 50,
            repeated_preview_rows: 200,
            sample_rows: 50,
        }
    }
}

pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Which uploads are accepted before any decoding happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            extensions: ["csv", "xlsx", "xlsm", "xlsb", "xls", "ods"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }

    pub fn allows(&self, file_name: &str) -> bool {
        extension(file_name)
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    pub fn check(&self, file_name: &str, size: u64) -> Result<(), DecodeError> {
        if !self.allows(file_name) {
            return Err(DecodeError::UnsupportedFormat {
                extension: extension(file_name).unwrap_or_default(),
            });
        }
        if size > self.max_bytes {
            return Err(DecodeError::PayloadTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Lowercased file extension, if any.
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds() {
        let options = ReportOptions::default();
        assert_eq!(options.top_reasons, 15);
        assert_eq!(options.top_students_global, 200);
        assert_eq!(options.top_students_per_module, 100);
        assert_eq!(options.sample_rows, 50);
    }

    #[test]
    fn accepts_spreadsheet_extensions_case_insensitively() {
        let policy = UploadPolicy::default();
        assert!(policy.allows("attendance.XLSX"));
        assert!(policy.allows("export.csv"));
        assert!(!policy.allows("notes.txt"));
        assert!(!policy.allows("no_extension"));
    }

    #[test]
    fn rejects_oversized_payloads() {
        let policy = UploadPolicy::with_max_bytes(10);
        assert!(policy.check("a.csv", 10).is_ok());
        assert!(matches!(
            policy.check("a.csv", 11),
            Err(DecodeError::PayloadTooLarge { size: 11, limit: 10 })
        ));
        assert!(matches!(
            policy.check("a.pdf", 1),
            Err(DecodeError::UnsupportedFormat { .. })
        ));
    }
}
