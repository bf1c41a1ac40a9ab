//! File-name similarity for orphan matching
//!
//! Names are normalized before comparison: lowercased, OS copy markers such
//! as `(1)`, ` copy` or `-copy 2` stripped from the stem, and everything but
//! ASCII letters and digits dropped. Similarity is `1 - distance / max_len`
//! over the normalized forms.

use std::path::Path;

/// Edit distance (insert, delete, substitute), two-row DP.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Strip trailing copy markers: `name (2)`, `name copy`, `name-copy 3`, `name_copy`.
fn strip_copy_markers(stem: &str) -> &str {
    let mut stem = stem.trim_end();
    loop {
        let before = stem;

        // "(12)"
        if let Some(open) = stem.rfind('(') {
            let inner = &stem[open + 1..];
            if let Some(digits) = inner.strip_suffix(')') {
                if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                    stem = stem[..open].trim_end();
                }
            }
        }

        // "copy 3"
        let without_number = stem.trim_end_matches(|c: char| c.is_ascii_digit()).trim_end();
        for marker in [" copy", "-copy", "_copy", " - copy"] {
            if without_number.len() > marker.len() && without_number.ends_with(marker) {
                stem = without_number[..without_number.len() - marker.len()].trim_end();
                break;
            }
        }

        if stem == before {
            return stem;
        }
    }
}

/// Canonical comparison form of a file name.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let path = Path::new(&lowered);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    strip_copy_markers(&stem)
        .chars()
        .chain(extension.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Normalized similarity in `[0.0, 1.0]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(&a, &b) as f64 / longest as f64
}

pub fn is_fuzzy_match(candidate: &str, target: &str, threshold: f64) -> bool {
    similarity(candidate, target) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("kitten", "sitting", 3)]
    #[case("ERROR", "ERRO", 1)]
    #[case("", "abc", 3)]
    #[case("same", "same", 0)]
    fn test_levenshtein_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein_distance(a, b), expected);
    }

    #[rstest]
    #[case("Tax Return (1).pdf", "taxreturnpdf")]
    #[case("Tax Return copy.pdf", "taxreturnpdf")]
    #[case("tax_return-copy 2.PDF", "taxreturnpdf")]
    #[case("Tax-Return.pdf", "taxreturnpdf")]
    #[case("passport (2) (1).jpg", "passportjpg")]
    #[case("copy.pdf", "copypdf")]
    fn test_normalize_name(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_name(raw), expected);
    }

    #[test]
    fn test_copy_of_same_file_matches() {
        assert!(is_fuzzy_match("W2 Form (1).pdf", "w2-form.pdf", 0.8));
        assert!(is_fuzzy_match("lease_agreement.pdf", "Lease Agreement copy.pdf", 0.8));
    }

    #[test]
    fn test_different_files_do_not_match() {
        assert!(!is_fuzzy_match("passport.jpg", "tax-return.pdf", 0.8));
        assert!(!is_fuzzy_match("", "", 0.8));
    }

    proptest! {
        #[test]
        fn prop_similarity_is_symmetric_and_bounded(a in "[a-zA-Z0-9 ._()-]{0,24}", b in "[a-zA-Z0-9 ._()-]{0,24}") {
            let ab = similarity(&a, &b);
            let ba = similarity(&b, &a);
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert!((ab - ba).abs() < 1e-9);
        }

        #[test]
        fn prop_distance_bounded_by_longer_input(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            let d = levenshtein_distance(&a, &b);
            prop_assert!(d <= a.chars().count().max(b.chars().count()));
        }
    }
}
