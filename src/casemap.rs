//! RFC 1459 case mapping for nicknames and channel names.
//!
//! IRC treats `[]\~` as the uppercase forms of `{}|^`, in addition to the ASCII letters.

/// Returns the case-folded form of `name`, suitable as a lookup key.
#[must_use]
pub fn fold(name: &str) -> String {
    name.chars().map(fold_char).collect()
}

/// Compares two names case-insensitively.
#[must_use]
pub fn eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().map(fold_char).eq(b.chars().map(fold_char))
}

const fn fold_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        c => c.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Alice", "alice")]
    #[case("#Rust", "#rust")]
    #[case("[Bot]", "{bot}")]
    #[case("back\\slash~", "back|slash^")]
    #[case("ÆØÅ", "ÆØÅ")]
    fn it_should_fold(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(fold(input), expected);
    }

    #[test]
    fn it_should_compare_case_insensitively() {
        assert!(eq("ZeTa[1]", "zeta{1}"));
        assert!(!eq("zeta", "zeta_"));
        assert!(!eq("alice", "bob"));
    }
}
