//! Dedup key normalisation.
//!
//! Canonicalises titles so that the same film or series listed by
//! different sources (differing only in case, punctuation or spacing)
//! produces the same key.

/// Build a dedup key from a title and an optional release year.
///
/// Applies the following transformations:
///
/// 1. Split on every non-alphanumeric character (Unicode aware).
/// 2. Lowercase each word and join with single spaces.
/// 3. Append `|<year>` when the year is known.
///
/// A title with no alphanumeric characters yields an empty key, which
/// the deduplicator treats as unmergeable.
///
/// # Examples
///
/// ```
/// use flixscout_search::orchestrator::key::dedup_key;
///
/// assert_eq!(dedup_key("Spider-Man: No Way Home", Some(2021)), "spider man no way home|2021");
/// assert_eq!(dedup_key("  spider man   no way home ", Some(2021)), "spider man no way home|2021");
/// assert_eq!(dedup_key("???", None), "");
/// ```
pub fn dedup_key(title: &str, year: Option<u16>) -> String {
    let words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    if words.is_empty() {
        return String::new();
    }

    let base = words.join(" ");
    match year {
        Some(year) => format!("{base}|{year}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(dedup_key("The Matrix!", None), "the matrix");
    }

    #[test]
    fn year_disambiguates_remakes() {
        assert_ne!(dedup_key("Dune", Some(1984)), dedup_key("Dune", Some(2021)));
    }

    #[test]
    fn missing_year_differs_from_known_year() {
        assert_ne!(dedup_key("Dune", None), dedup_key("Dune", Some(2021)));
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(dedup_key("Amélie", Some(2001)), "amélie|2001");
    }

    #[test]
    fn empty_title_yields_empty_key_even_with_year() {
        assert_eq!(dedup_key("", Some(2020)), "");
        assert_eq!(dedup_key(" - ", Some(2020)), "");
    }
}
