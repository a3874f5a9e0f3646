//! Column header logic shared by the read and write paths
//!
//! A group file's header is the fixed common prefix followed by the group's
//! own fields in ascending order. Sorting makes the header independent of
//! the order fields were produced in, so the same field set always yields
//! the same header across process restarts.

use std::collections::BTreeSet;
use std::path::Path;

use super::errors::{CsvDbError, CsvDbResult};

/// Columns every group file starts with, in this order
pub const COMMON_FIELDS: [&str; 5] = ["timestamp", "sensor", "target", "socket", "cpu"];

/// Returns whether `field` is one of the common columns
pub fn is_common_field(field: &str) -> bool {
    COMMON_FIELDS.contains(&field)
}

/// Builds the header for a group from its field names.
///
/// Common fields always come first in their fixed order, whether or not they
/// appear in `fields`. Every other field follows, sorted and deduplicated.
pub fn compute_header<'a, I>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let extra: BTreeSet<&str> = fields
        .into_iter()
        .filter(|f| !is_common_field(f))
        .collect();

    COMMON_FIELDS
        .iter()
        .map(|f| f.to_string())
        .chain(extra.into_iter().map(str::to_string))
        .collect()
}

/// Returns the common columns missing from `header`, in canonical order
pub fn missing_common_fields<S: AsRef<str>>(header: &[S]) -> Vec<String> {
    COMMON_FIELDS
        .iter()
        .filter(|common| !header.iter().any(|h| h.as_ref() == **common))
        .map(|common| common.to_string())
        .collect()
}

/// Fails with `BadCommonKeys` unless `header` holds every common column
pub fn validate_common_fields<S: AsRef<str>>(path: &Path, header: &[S]) -> CsvDbResult<()> {
    let missing = missing_common_fields(header);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CsvDbError::BadCommonKeys {
            path: path.to_path_buf(),
            missing,
        })
    }
}

/// Fails with `HeaderMismatch` unless the on-disk header equals the computed one
pub fn check_header(path: &Path, expected: &[String], found: &[String]) -> CsvDbResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CsvDbError::HeaderMismatch {
            path: path.to_path_buf(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}
