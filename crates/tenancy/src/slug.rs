//! Slug and e-mail normalization rules.

pub const MAX_SLUG_LEN: usize = 64;

/// Lower-case ASCII alphanumerics separated by single hyphens.
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLUG_LEN
        && s.split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

/// Best-effort slug for a display name ("Acme Inc." -> "acme-inc").
///
/// Returns an empty string when the name has no ASCII alphanumerics.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if out.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    out.truncate(MAX_SLUG_LEN);
    out.trim_end_matches('-').to_string()
}

/// Slugs in the order a free one is probed: `base`, `base-1`, `base-2`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1u32..).map(move |n| format!("{base}-{n}")))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_slugs() {
        assert!(is_valid_slug("acme"));
        assert!(is_valid_slug("acme-1"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme--1"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn candidates_suffix_in_order() {
        let c: Vec<_> = slug_candidates("acme").take(3).collect();
        assert_eq!(c, vec!["acme", "acme-1", "acme-2"]);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Acme Inc."), "acme-inc");
        assert_eq!(slugify("  North / South  Campus "), "north-south-campus");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn emails_are_trimmed_and_lower_cased() {
        assert_eq!(normalize_email("  Owner@Acme.TEST "), "owner@acme.test");
    }

    proptest! {
        #[test]
        fn slugify_output_is_empty_or_valid(name in ".{0,80}") {
            let s = slugify(&name);
            prop_assert!(s.is_empty() || is_valid_slug(&s));
        }
    }
}
