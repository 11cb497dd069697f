//! Keyword-set matching shared by the news analyzer and context inference.
//!
//! Short keywords (four characters or fewer) only match whole words, so "ai"
//! does not fire on "said" and "cto" does not fire on "director". Longer
//! keywords match anywhere in the text.

/// Lowercased text prepared for both substring and whole-word lookups.
#[derive(Debug, Clone)]
pub struct SearchText {
    lowered: String,
    padded_words: String,
}

impl SearchText {
    pub fn new(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let words: String = lowered
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let padded_words = format!(" {} ", words.split_whitespace().collect::<Vec<_>>().join(" "));
        Self {
            lowered,
            padded_words,
        }
    }

    /// Joins several fragments into one searchable text.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let joined = parts.into_iter().collect::<Vec<_>>().join(" ");
        Self::new(&joined)
    }

    pub fn is_empty(&self) -> bool {
        self.lowered.trim().is_empty()
    }

    /// Keyword match using the short-word rule.
    pub fn contains(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if keyword.chars().count() <= 4 {
            self.contains_phrase(&keyword)
        } else {
            self.lowered.contains(&keyword)
        }
    }

    /// Whole-word (or whole-phrase) match regardless of length.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let normalized: String = phrase
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let tokens = normalized.split_whitespace().collect::<Vec<_>>();
        if tokens.is_empty() {
            return false;
        }
        self.padded_words
            .contains(&format!(" {} ", tokens.join(" ")))
    }

    /// Keywords from `set` present in the text, in set order.
    pub fn hits(&self, set: &[&'static str]) -> Vec<&'static str> {
        set.iter().copied().filter(|k| self.contains(k)).collect()
    }

    pub fn count(&self, set: &[&str]) -> usize {
        set.iter().filter(|k| self.contains(k)).count()
    }

    pub fn any(&self, set: &[&str]) -> bool {
        set.iter().any(|k| self.contains(k))
    }

    /// Entities from `set` mentioned as whole words or phrases.
    pub fn entities(&self, set: &[&'static str]) -> Vec<&'static str> {
        set.iter()
            .copied()
            .filter(|k| self.contains_phrase(k))
            .collect()
    }
}

/// Whether any of `texts` mentions a keyword from `set`.
pub fn any_in<'a, I>(texts: I, set: &[&str]) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    SearchText::from_parts(texts).any(set)
}
