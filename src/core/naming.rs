//! Identifier case conversion
//!
//! Code-level names (Rust variants, record fields) and their database
//! representation rarely share a spelling. A [`NamingConvention`] describes how
//! a name is written on the database side; conversion always goes through a
//! word split so any source spelling can be re-cased.

/// How identifiers are spelled in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamingConvention {
    /// Keep the name exactly as written in code
    AsIs,
    /// `light_novel`
    SnakeCase,
    /// `LIGHT_NOVEL`
    UpperSnakeCase,
    /// `LightNovel`
    PascalCase,
    /// `lightNovel`
    CamelCase,
    /// `light-novel`
    KebabCase,
}

impl NamingConvention {
    /// Re-spell `name` according to this convention
    ///
    /// # Example
    ///
    /// ```
    /// use media_catalog::core::naming::NamingConvention;
    ///
    /// assert_eq!(NamingConvention::SnakeCase.apply("primaryTitle"), "primary_title");
    /// assert_eq!(NamingConvention::UpperSnakeCase.apply("LightNovel"), "LIGHT_NOVEL");
    /// ```
    pub fn apply(&self, name: &str) -> String {
        let words = split_words(name);
        match self {
            NamingConvention::AsIs => name.to_string(),
            NamingConvention::SnakeCase => join_lower(&words, "_"),
            NamingConvention::KebabCase => join_lower(&words, "-"),
            NamingConvention::UpperSnakeCase => words
                .iter()
                .map(|w| w.to_uppercase())
                .collect::<Vec<_>>()
                .join("_"),
            NamingConvention::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
            NamingConvention::CamelCase => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
        }
    }
}

/// Split an identifier into words
///
/// Boundaries are `_`, `-`, whitespace, a lower-case letter or digit followed
/// by an upper-case letter, and the last capital of an acronym that starts a
/// new word (`HTTPServer` splits into `HTTP` and `Server`).
pub fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

fn join_lower(words: &[String], separator: &str) -> String {
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("LightNovel"), vec!["Light", "Novel"]);
        assert_eq!(split_words("primary_title"), vec!["primary", "title"]);
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("sourceURL"), vec!["source", "URL"]);
        assert_eq!(split_words("Level2Boss"), vec!["Level2", "Boss"]);
        assert_eq!(split_words("on-hold"), vec!["on", "hold"]);
        assert!(split_words("__").is_empty());
    }

    #[test]
    fn test_apply_conventions() {
        let name = "PlanToRead";
        assert_eq!(NamingConvention::AsIs.apply(name), "PlanToRead");
        assert_eq!(NamingConvention::SnakeCase.apply(name), "plan_to_read");
        assert_eq!(NamingConvention::UpperSnakeCase.apply(name), "PLAN_TO_READ");
        assert_eq!(NamingConvention::PascalCase.apply("plan_to_read"), "PlanToRead");
        assert_eq!(NamingConvention::CamelCase.apply("PLAN_TO_READ"), "planToRead");
        assert_eq!(NamingConvention::KebabCase.apply(name), "plan-to-read");
    }

    #[test]
    fn test_acronyms_are_normalised() {
        assert_eq!(NamingConvention::PascalCase.apply("HTTPServer"), "HttpServer");
        assert_eq!(NamingConvention::SnakeCase.apply("sourceURL"), "source_url");
    }
}
