//! Case conversion for generated identifiers.
//!
//! Split characters are matched literally, so `.` or `|` behave like any
//! other character and never as pattern syntax.

/// Characters that separate words unless the caller supplies its own set
pub const DEFAULT_SPLIT_CHARS: [char; 4] = [' ', '-', '_', '/'];

/// Convert to lower camel case using [`DEFAULT_SPLIT_CHARS`]
///
/// ```
/// use composable_crud_core::case::to_camel_case;
///
/// assert_eq!(to_camel_case("FETCH_LIST_SUCCESS"), "fetchListSuccess");
/// assert_eq!(to_camel_case("first-SECOND_third"), "firstSecondThird");
/// ```
#[must_use]
pub fn to_camel_case(input: &str) -> String {
    to_camel_case_with(input, &DEFAULT_SPLIT_CHARS)
}

/// Convert to lower camel case splitting on `split_chars`
///
/// The first word is lowercased; every following word gets an uppercase
/// first character and a lowercase rest. Empty fragments between adjacent
/// separators stay empty.
#[must_use]
pub fn to_camel_case_with(input: &str, split_chars: &[char]) -> String {
    let mut out = String::with_capacity(input.len());

    for (index, word) in input.split(|c| split_chars.contains(&c)).enumerate() {
        if index == 0 {
            out.push_str(&word.to_lowercase());
            continue;
        }

        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }

    out
}
