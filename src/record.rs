use std::fmt::Write as _;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub identifier: String,
    pub name: String,
    pub membership: String,
    pub adults: u32,
    pub children: u32,
}

impl MemberRecord {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        membership: impl Into<String>,
        adults: u32,
        children: u32,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            membership: membership.into(),
            adults,
            children,
        }
    }

    pub fn invalid_reason(&self) -> Option<&'static str> {
        if self.identifier.trim().is_empty() {
            Some("blank identifier")
        } else if self.name.trim().is_empty() {
            Some("blank name")
        } else {
            None
        }
    }

    pub fn counts_line(&self) -> Option<String> {
        if self.adults == 0 && self.children == 0 {
            None
        } else {
            Some(format!("Adults {} / Children {}", self.adults, self.children))
        }
    }
}

// Filesystem-safe stem for a display name: keep [A-Za-z0-9 _-], collapse
// space runs to single underscores, fall back to "member" when nothing is
// left.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let mut out = String::with_capacity(kept.len());
    let mut in_gap = false;
    for c in kept.trim().chars() {
        if c == ' ' {
            if !in_gap {
                out.push('_');
            }
            in_gap = true;
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    if out.is_empty() {
        "member".to_string()
    } else {
        out
    }
}

// SHA-256 as lowercase hex. Stable across runs, so the same member always
// lands on the same disambiguated filename.
pub fn identifier_digest(identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

pub fn identifier_suffix(identifier: &str) -> String {
    identifier_digest(identifier)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_chars_and_joins_words() {
        assert_eq!(sanitize_name("John Doe"), "John_Doe");
        assert_eq!(sanitize_name("  A/B:C*D?  "), "ABCD");
        assert_eq!(sanitize_name("Mary-Jane_42"), "Mary-Jane_42");
        assert_eq!(sanitize_name("a   b\t c"), "a_b_c");
    }

    #[test]
    fn sanitize_falls_back_for_empty_results() {
        assert_eq!(sanitize_name(""), "member");
        assert_eq!(sanitize_name("???!!!"), "member");
        assert_eq!(sanitize_name("   "), "member");
    }

    #[test]
    fn suffix_is_stable_and_distinguishes_identifiers() {
        assert_eq!(identifier_suffix("A1"), identifier_suffix("A1"));
        assert_ne!(identifier_suffix("A1"), identifier_suffix("B2"));
        assert_eq!(identifier_suffix("A1").len(), 8);
        assert!(identifier_digest("A1").starts_with(&identifier_suffix("A1")));
    }

    #[test]
    fn invalid_reason_flags_blank_fields() {
        let ok = MemberRecord::new("A1", "Ann", "Family", 2, 1);
        assert_eq!(ok.invalid_reason(), None);
        let no_id = MemberRecord::new("  ", "Ann", "", 0, 0);
        assert_eq!(no_id.invalid_reason(), Some("blank identifier"));
        let no_name = MemberRecord::new("A1", "", "", 0, 0);
        assert_eq!(no_name.invalid_reason(), Some("blank name"));
    }

    #[test]
    fn counts_line_skips_empty_households() {
        assert_eq!(MemberRecord::new("A", "B", "", 0, 0).counts_line(), None);
        assert_eq!(
            MemberRecord::new("A", "B", "", 2, 1).counts_line().as_deref(),
            Some("Adults 2 / Children 1")
        );
    }
}
