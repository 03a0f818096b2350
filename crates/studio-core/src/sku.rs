//! # SKU Allocation
//!
//! Human-readable product codes derived from free text.
//!
//! ## Allocation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "Patricia Forbes" + "Study 1"                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize()          → "PATRICIA-FORBES-STUDY-1"                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  taken? ── no ──► use it                                               │
//! │       │                                                                 │
//! │      yes                                                                │
//! │       ▼                                                                 │
//! │  try "-2", "-3", ... (base truncated so the result fits max_len)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  first free candidate, or AllocationExhausted after the cap            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The existence check is a caller-supplied predicate so this module stays
//! free of I/O. The database layer feeds it the set of SKUs already stored
//! inside the same transaction and relies on the UNIQUE index as the final
//! arbiter.

use crate::error::CoreError;
use crate::MAX_SKU_ATTEMPTS;

/// Uppercases `text` and collapses every run of non-alphanumeric ASCII
/// characters into a single dash, trimming dashes at both ends.
///
/// ## Example
/// ```rust
/// use studio_core::sku::normalize;
///
/// assert_eq!(normalize("Patricia Forbes-Sunset #3!!"), "PATRICIA-FORBES-SUNSET-3");
/// assert_eq!(normalize("  --  "), "");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_uppercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

/// Returns a code derived from `base` for which `exists` is false.
///
/// The plain normalized code is tried first, then `-2`, `-3`, ... up to
/// [`MAX_SKU_ATTEMPTS`] suffixes. Every candidate is at most `max_len`
/// characters long.
///
/// ## Example
/// ```rust
/// use std::collections::HashSet;
/// use studio_core::sku::allocate_unique;
///
/// let taken: HashSet<String> = ["STUDY-1".to_string()].into();
/// let sku = allocate_unique("Study 1", |c| taken.contains(c), 255).unwrap();
/// assert_eq!(sku, "STUDY-1-2");
/// ```
pub fn allocate_unique<F>(base: &str, mut exists: F, max_len: usize) -> Result<String, CoreError>
where
    F: FnMut(&str) -> bool,
{
    // normalize() only emits ASCII, so byte slicing is char slicing here
    let mut base = normalize(base);
    base.truncate(max_len);

    if !exists(&base) {
        return Ok(base);
    }

    for i in 2..=MAX_SKU_ATTEMPTS + 1 {
        let suffix = format!("-{i}");
        let keep = max_len.saturating_sub(suffix.len()).min(base.len());
        let candidate = format!("{}{}", &base[..keep], suffix);
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }

    Err(CoreError::AllocationExhausted {
        base,
        attempts: MAX_SKU_ATTEMPTS,
    })
}

/// Longest prefix shared by every candidate [`allocate_unique`] can return
/// for an already-normalized `base`.
///
/// The database layer loads only SKUs starting with this prefix before
/// running the allocator.
pub fn candidate_prefix(base: &str, max_len: usize) -> &str {
    let longest_suffix = format!("-{}", MAX_SKU_ATTEMPTS + 1).len();
    let keep = max_len.saturating_sub(longest_suffix).min(base.len());
    &base[..keep]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn taken(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize("Patricia Forbes-Sunset #3!!"), "PATRICIA-FORBES-SUNSET-3");
        assert_eq!(normalize("Study 1"), "STUDY-1");
        assert_eq!(normalize("--already-CODE--"), "ALREADY-CODE");
        assert_eq!(normalize("a   b"), "A-B");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_treats_non_ascii_as_separator() {
        assert_eq!(normalize("18x24 Hahnemühle"), "18X24-HAHNEM-HLE");
        assert_eq!(normalize("Café—Noir"), "CAF-NOIR");
    }

    #[test]
    fn test_normalize_output_alphabet_and_idempotence() {
        let inputs = [
            "Patricia Forbes-Sunset #3!!",
            "  leading and trailing  ",
            "___",
            "Ünïcödé / mixed 42",
            "x--y",
            "!a!b!c!",
        ];
        for s in inputs {
            let once = normalize(s);
            assert!(once
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-'));
            assert!(!once.starts_with('-') && !once.ends_with('-'));
            assert!(!once.contains("--"));
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_allocate_returns_base_when_free() {
        let existing = taken(&[]);
        let sku = allocate_unique("Study 1", |c| existing.contains(c), 255).unwrap();
        assert_eq!(sku, "STUDY-1");
    }

    #[test]
    fn test_allocate_appends_first_free_suffix() {
        let existing = taken(&["STUDY-1"]);
        assert_eq!(
            allocate_unique("Study 1", |c| existing.contains(c), 255).unwrap(),
            "STUDY-1-2"
        );

        let existing = taken(&["STUDY-1", "STUDY-1-2", "STUDY-1-3"]);
        assert_eq!(
            allocate_unique("Study 1", |c| existing.contains(c), 255).unwrap(),
            "STUDY-1-4"
        );
    }

    #[test]
    fn test_allocate_truncates_to_max_len() {
        let existing = taken(&[]);
        let sku = allocate_unique("ABCDEFGHIJ", |c| existing.contains(c), 6).unwrap();
        assert_eq!(sku, "ABCDEF");

        let existing = taken(&["ABCDEF"]);
        let sku = allocate_unique("ABCDEFGHIJ", |c| existing.contains(c), 6).unwrap();
        assert_eq!(sku, "ABCD-2");
        assert!(sku.len() <= 6);
    }

    #[test]
    fn test_allocate_result_not_in_existing_set() {
        let existing: HashSet<String> = (2..50)
            .map(|i| format!("WAVE-{i}"))
            .chain(std::iter::once("WAVE".to_string()))
            .collect();
        for max_len in [6, 8, 255] {
            let sku = allocate_unique("wave", |c| existing.contains(c), max_len).unwrap();
            assert!(!existing.contains(&sku));
            assert!(sku.len() <= max_len);
        }
    }

    #[test]
    fn test_allocate_gives_up_after_cap() {
        let err = allocate_unique("Study", |_| true, 255).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AllocationExhausted { attempts, .. } if attempts == MAX_SKU_ATTEMPTS
        ));
    }

    #[test]
    fn test_candidate_prefix_covers_all_candidates() {
        let base = "A".repeat(300);
        let prefix = candidate_prefix(&base[..255], 255);
        assert_eq!(prefix.len(), 255 - "-10001".len());

        let existing = taken(&["SHORT"]);
        let sku = allocate_unique("short", |c| existing.contains(c), 255).unwrap();
        assert!(sku.starts_with(candidate_prefix("SHORT", 255)));
    }
}
