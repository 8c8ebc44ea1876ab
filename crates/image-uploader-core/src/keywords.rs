//! Set operations over keyword lists.
//!
//! Keyword lists are small and their order matters for display, so they are
//! kept as slices and compared exactly rather than converted to hash sets.

/// Keywords of `wanted` that are present in `keywords`, in `wanted` order,
/// without duplicates
pub fn intersection<S: AsRef<str>>(keywords: &[S], wanted: &[S]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for keyword in wanted {
        let keyword = keyword.as_ref();
        if contains(keywords, keyword) && !contains(&result, keyword) {
            result.push(keyword.to_string());
        }
    }
    result
}

/// Keywords of `keywords` that are not in `removed`, in `keywords` order
pub fn difference<S: AsRef<str>, R: AsRef<str>>(keywords: &[S], removed: &[R]) -> Vec<String> {
    keywords
        .iter()
        .map(|keyword| keyword.as_ref())
        .filter(|keyword| !contains(removed, keyword))
        .map(str::to_string)
        .collect()
}

/// True if every keyword in `wanted` is present in `keywords`
pub fn contains_all<S: AsRef<str>>(keywords: &[S], wanted: &[S]) -> bool {
    wanted.iter().all(|w| contains(keywords, w.as_ref()))
}

/// True if at least one keyword in `wanted` is present in `keywords`
pub fn contains_any<S: AsRef<str>>(keywords: &[S], wanted: &[S]) -> bool {
    wanted.iter().any(|w| contains(keywords, w.as_ref()))
}

/// Remove repeated keywords, keeping the first occurrence
pub fn dedup(keywords: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for keyword in keywords {
        if !contains(&result, &keyword) {
            result.push(keyword);
        }
    }
    result
}

fn contains<S: AsRef<str>>(keywords: &[S], keyword: &str) -> bool {
    keywords.iter().any(|k| k.as_ref() == keyword)
}
