//! Cross-file sample ID checks
//!
//! Every leaf of the tree needs a row in the distance matrix and in the
//! metadata. Metadata rows for samples that are not in the tree are
//! dropped so they don't inflate colour categories or the ID lists shown
//! in the report.

use std::collections::HashSet;

use log::{debug, info};
use thiserror::Error;

use crate::matrix::DistanceMatrix;
use crate::metadata::Metadata;
use crate::tree::Tree;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Sample ID {0} occurs in tree but not in SNP distance matrix")]
    MissingFromMatrix(String),

    #[error("Sample ID {0} occurs in tree but not in the metadata")]
    MissingFromMetadata(String),
}

/// Outcome of [`check_ids`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdCheck {
    /// Ignored IDs that were let through
    pub allowed: Vec<String>,
    /// Metadata rows removed because their sample is not in the tree
    pub dropped: Vec<String>,
}

/// Check tree leaves against the matrix and metadata, and prune metadata
/// rows for samples missing from the tree.
///
/// IDs for which `is_ignored` returns true (an outgroup or reference, say)
/// are exempt from both checks.
pub fn check_ids(
    tree: &Tree,
    metadata: &mut Metadata,
    matrix: &DistanceMatrix,
    is_ignored: impl Fn(&str) -> bool,
) -> Result<IdCheck, ValidationError> {
    let leaves: HashSet<&str> = tree.terminal_names().into_iter().collect();
    let mut check = IdCheck::default();

    for sample in tree.terminal_names() {
        if is_ignored(sample) {
            info!("Allowing {}", sample);
            check.allowed.push(sample.to_string());
            continue;
        }
        if !matrix.contains(sample) {
            return Err(ValidationError::MissingFromMatrix(sample.to_string()));
        }
        if !metadata.contains(sample) {
            return Err(ValidationError::MissingFromMetadata(sample.to_string()));
        }
    }

    check.dropped = metadata.retain_ids(|id| {
        if leaves.contains(id) {
            return true;
        }
        if is_ignored(id) {
            info!("Allowing {}", id);
            return true;
        }
        false
    });

    if !check.dropped.is_empty() {
        debug!(
            "Dropped {} metadata rows not present in the tree: {}",
            check.dropped.len(),
            check.dropped.join(", ")
        );
    }

    Ok(check)
}
