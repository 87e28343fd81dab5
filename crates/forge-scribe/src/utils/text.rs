//! String helpers
//!
//! `canonical_title` is the only mechanism by which a `\target` written with
//! a human title and a link written with a slug are matched, so it must stay
//! exact and deterministic.

/// Build the canonical slug for a title or target name.
///
/// The string is lower-cased, every maximal run of characters outside
/// `[a-z0-9]` becomes a single `-`, and leading/trailing `-` are removed.
///
/// ```
/// use forge_scribe::utils::canonical_title;
///
/// assert_eq!(canonical_title(" Foo_Bar--Baz! "), "foo-bar-baz");
/// ```
pub fn canonical_title(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !result.is_empty() {
                result.push('-');
            }
            pending_dash = false;
            result.push(ch);
        } else {
            pending_dash = true;
        }
    }

    result
}

/// Collapse internal whitespace runs to one space and trim both ends.
pub fn simplified(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance between two strings, counted in characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the candidate closest to `actual`.
///
/// Only candidates sharing the first character are considered. A
/// suggestion is returned when exactly one candidate has the smallest
/// distance, that distance is at most 2, and the two names together are
/// at least 5 characters long.
pub fn nearest_name<'a, I>(actual: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let first = actual.chars().next()?;
    let mut best: Option<&str> = None;
    let mut best_delta = usize::MAX;
    let mut num_best = 0;

    for candidate in candidates {
        if candidate.chars().next() != Some(first) {
            continue;
        }
        let delta = edit_distance(actual, candidate);
        if delta < best_delta {
            best_delta = delta;
            best = Some(candidate);
            num_best = 1;
        } else if delta == best_delta && best != Some(candidate) {
            num_best += 1;
        }
    }

    let best = best?;
    if num_best == 1 && best_delta <= 2 && actual.chars().count() + best.chars().count() >= 5 {
        Some(best.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_title() {
        assert_eq!(canonical_title(" Foo_Bar--Baz! "), "foo-bar-baz");
        assert_eq!(canonical_title(""), "");
        assert_eq!(canonical_title("---"), "");
        assert_eq!(canonical_title("Qt 6.5 Release Notes"), "qt-6-5-release-notes");
        assert_eq!(canonical_title("Über Größe"), "ber-gr-e");
    }

    #[test]
    fn test_canonical_title_idempotent() {
        for input in ["Some Title", " a--b ", "QString::count()", "x", "Ünïcödé words"] {
            let once = canonical_title(input);
            assert_eq!(canonical_title(&once), once);
        }
    }

    #[test]
    fn test_simplified() {
        assert_eq!(simplified("  a \n\t b  "), "a b");
        assert_eq!(simplified(""), "");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
        assert_eq!(edit_distance("sectoin1", "section1"), 2);
    }

    #[test]
    fn test_nearest_name() {
        let commands = ["section1", "section2", "sidebar", "snippet", "list"];
        assert_eq!(
            nearest_name("sidebr", commands.iter().copied()),
            Some("sidebar".to_string())
        );
        // section1 and section2 are equally close
        assert_eq!(nearest_name("sectionx", commands.iter().copied()), None);
        // different first letter
        assert_eq!(nearest_name("ist", commands.iter().copied()), None);
        // too short overall
        assert_eq!(nearest_name("l", ["li"].iter().copied()), None);
    }
}
