//! Picks the upload path for every file of one invocation.
//!
//! Rules, applied once per invocation and never revisited mid-transfer:
//! - any file above [`MAX_FILE_SIZE`] or a batch above [`MAX_BATCH_SIZE`] is
//!   rejected before any request is made;
//! - a file above [`CHUNK_THRESHOLD`] is always chunked;
//! - when the whole batch exceeds [`DIRECT_REQUEST_LIMIT`], every file is chunked,
//!   since the platform would refuse the single multipart request anyway.

use super::error::ValidationError;
use super::file::UploadFile;
use crate::models::{
    bytes_to_mb, CHUNK_THRESHOLD, DIRECT_REQUEST_LIMIT, MAX_BATCH_SIZE, MAX_FILE_SIZE,
};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStrategy {
    Direct,
    Chunked,
}

/// Strategy per file, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    strategies: Vec<UploadStrategy>,
    total_bytes: u64,
}

impl UploadPlan {
    pub fn strategies(&self) -> &[UploadStrategy] {
        &self.strategies
    }

    pub fn strategy(&self, index: usize) -> Option<UploadStrategy> {
        self.strategies.get(index).copied()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn indices(&self, strategy: UploadStrategy) -> Vec<usize> {
        self.strategies
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == strategy)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Strategy a file would get on its own.
pub fn classify_size(size: u64) -> UploadStrategy {
    if size > CHUNK_THRESHOLD {
        UploadStrategy::Chunked
    } else {
        UploadStrategy::Direct
    }
}

pub fn classify(files: &[UploadFile]) -> Result<UploadPlan, ValidationError> {
    classify_sizes(files.iter().map(|f| (f.name(), f.size())))
}

/// Same as [`classify`], over `(name, size)` pairs.
pub fn classify_sizes<'a, I>(files: I) -> Result<UploadPlan, ValidationError>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let files: Vec<(&str, u64)> = files.into_iter().collect();
    if files.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut seen = HashSet::with_capacity(files.len());
    if let Some((name, _)) = files.iter().find(|(name, _)| !seen.insert(*name)) {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }

    if let Some((name, size)) = files.iter().find(|(_, size)| *size > MAX_FILE_SIZE) {
        return Err(ValidationError::FileTooLarge {
            name: name.to_string(),
            size: *size,
            size_mb: bytes_to_mb(*size),
            limit_mb: bytes_to_mb(MAX_FILE_SIZE),
        });
    }

    let total_bytes: u64 = files.iter().map(|(_, size)| size).sum();
    if total_bytes > MAX_BATCH_SIZE {
        return Err(ValidationError::BatchTooLarge {
            total: total_bytes,
            total_mb: bytes_to_mb(total_bytes),
            limit_mb: bytes_to_mb(MAX_BATCH_SIZE),
        });
    }

    let over_platform_limit = total_bytes > DIRECT_REQUEST_LIMIT;
    let strategies = files
        .iter()
        .map(|(_, size)| {
            if over_platform_limit {
                UploadStrategy::Chunked
            } else {
                classify_size(*size)
            }
        })
        .collect();

    Ok(UploadPlan {
        strategies,
        total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_small_batch_goes_direct() {
        let plan = classify_sizes([("a.pdf", 10 * MB), ("b.pdf", 5 * MB)]).unwrap();
        assert_eq!(
            plan.strategies(),
            &[UploadStrategy::Direct, UploadStrategy::Direct]
        );
        assert_eq!(plan.total_bytes(), 15 * MB);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert_eq!(
            classify_sizes([("budget.xlsx", MB), ("cv.pdf", MB), ("budget.xlsx", 2 * MB)]),
            Err(ValidationError::DuplicateName("budget.xlsx".to_string()))
        );
    }

    #[test]
    fn test_large_file_always_chunked() {
        let plan = classify_sizes([("video.mp4", 25 * MB + 1), ("a.pdf", MB)]).unwrap();
        assert_eq!(plan.strategy(0), Some(UploadStrategy::Chunked));
        assert_eq!(plan.strategy(1), Some(UploadStrategy::Direct));
        assert_eq!(classify_size(25 * MB), UploadStrategy::Direct);
    }

    #[test]
    fn test_batch_over_platform_limit_is_all_chunked() {
        let files: Vec<(String, u64)> = (0..5).map(|i| (format!("f{}.pdf", i), 8 * MB)).collect();
        let plan = classify_sizes(files.iter().map(|(n, s)| (n.as_str(), *s))).unwrap();
        assert!(plan
            .strategies()
            .iter()
            .all(|s| *s == UploadStrategy::Chunked));
        assert_eq!(plan.indices(UploadStrategy::Chunked), vec![0, 1, 2, 3, 4]);
        assert!(plan.indices(UploadStrategy::Direct).is_empty());
    }

    #[test]
    fn test_batch_exactly_at_platform_limit_stays_direct() {
        let plan = classify_sizes([("a.pdf", 15 * MB), ("b.pdf", 15 * MB)]).unwrap();
        assert_eq!(plan.indices(UploadStrategy::Direct), vec![0, 1]);
    }

    #[test]
    fn test_oversized_file_rejected_with_name_and_size() {
        let err = classify_sizes([("ok.pdf", MB), ("huge.mov", 600 * MB)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File \"huge.mov\" is 600.0 MB, exceeding the 500.0 MB limit"
        );
    }

    #[test]
    fn test_oversized_batch_rejected() {
        let err = classify_sizes([("a.mov", 300 * MB), ("b.mov", 300 * MB)]).unwrap_err();
        assert!(matches!(err, ValidationError::BatchTooLarge { total, .. } if total == 600 * MB));
    }

    #[test]
    fn test_empty_selection_rejected() {
        assert_eq!(
            classify_sizes(std::iter::empty()).unwrap_err(),
            ValidationError::Empty
        );
    }

    #[test]
    fn test_classification_is_stable() {
        let files = [("a.pdf", 20 * MB), ("b.pdf", 20 * MB), ("c.mov", 100 * MB)];
        let first = classify_sizes(files).unwrap();
        let second = classify_sizes(files).unwrap();
        assert_eq!(first, second);
    }
}
