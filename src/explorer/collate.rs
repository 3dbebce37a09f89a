//! Name ordering for listings.
//!
//! Approximates a locale collation without pulling in ICU data: names compare
//! first on their base letters (decomposed, combining marks removed,
//! lowercased, with punctuation and symbols ahead of digits ahead of letters),
//! then on accents, then lowercase before uppercase, and finally on the raw
//! text so the order is total.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn weight_class(c: char) -> u8 {
    if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else {
        0
    }
}

fn base_letters(s: &str) -> impl Iterator<Item = (u8, char)> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| (weight_class(c), c))
}

fn accent_key(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn case_key(c: char) -> bool {
    c.is_uppercase()
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accent_key(a).cmp(accent_key(b)))
        .then_with(|| a.nfd().map(case_key).cmp(b.nfd().map(case_key)))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<&str>) -> Vec<&str> {
        v.sort_by(|a, b| compare_names(a, b));
        v
    }

    #[test]
    fn case_does_not_split_the_alphabet() {
        assert_eq!(sorted(vec!["b", "B", "a", "A"]), vec!["a", "A", "b", "B"]);
        assert_eq!(sorted(vec!["Zeta", "alpha", "Beta"]), vec!["alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn accents_sort_next_to_base_letter() {
        assert_eq!(sorted(vec!["f", "é", "e"]), vec!["e", "é", "f"]);
    }

    #[test]
    fn punctuation_sorts_before_digits_and_letters() {
        assert_eq!(sorted(vec!["a", "~x"]), vec!["~x", "a"]);
        assert_eq!(sorted(vec!["b", "1", "_a", "{c"]), vec!["_a", "{c", "1", "b"]);
        assert_eq!(sorted(vec!["file10", "file_1", "file1"]), vec!["file_1", "file1", "file10"]);
    }

    #[test]
    fn ordering_is_total_and_consistent() {
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
        assert_eq!(compare_names("a.txt", "b.txt"), Ordering::Less);
        assert_eq!(compare_names("b.txt", "a.txt"), Ordering::Greater);
    }
}
