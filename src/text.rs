//! Tokenization shared by lexical scoring, late interaction and keyword boosting

/// Lowercased alphanumeric runs, in order of appearance
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
