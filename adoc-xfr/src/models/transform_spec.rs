//! Ordered search/replace pairs applied to every string leaf

use crate::error::{XfrError, XfrResult};
use serde::{Deserialize, Serialize};

/// One search/replace pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformPair {
    pub search: String,
    #[serde(default)]
    pub replace: String,
}

/// Ordered list of pairs for a run
///
/// Pairs are applied sequentially: the output of pair *n* is the input of
/// pair *n + 1*. Search strings are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformSpec {
    pairs: Vec<TransformPair>,
}

impl TransformSpec {
    pub fn new<S, R>(pairs: impl IntoIterator<Item = (S, R)>) -> XfrResult<Self>
    where
        S: Into<String>,
        R: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(search, replace)| TransformPair {
                search: search.into(),
                replace: replace.into(),
            })
            .collect();
        Self::from_pairs(pairs)
    }

    pub fn from_pairs(pairs: Vec<TransformPair>) -> XfrResult<Self> {
        if let Some(index) = pairs.iter().position(|p| p.search.is_empty()) {
            return Err(XfrError::InvalidTransform(format!(
                "search string of pair {} is empty",
                index + 1
            )));
        }
        Ok(Self { pairs })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Legacy `--source-env-string S --target-env-string T` form
    pub fn from_env_strings(source: &str, target: &str) -> XfrResult<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(XfrError::InvalidTransform(
                "source env string cannot be empty".to_string(),
            ));
        }
        Self::new([(source, target)])
    }

    /// Parse the command-line form `"A":"B", "C":"D"`
    ///
    /// Quoted tokens may contain `,` and `:`; `\"` escapes a quote inside a
    /// quoted token. Bare tokens are trimmed.
    pub fn parse(input: &str) -> XfrResult<Self> {
        let mut pairs = Vec::new();
        for item in split_unquoted(input, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let mut halves = split_unquoted(item, ':').into_iter();
            let search = halves.next().unwrap_or_default();
            let rest: Vec<&str> = halves.collect();
            if rest.is_empty() {
                return Err(XfrError::InvalidTransform(format!(
                    "expected \"search\":\"replace\", got {}",
                    item
                )));
            }
            // Unquoted colons after the first belong to the replacement
            let replace = rest.join(":");
            pairs.push(TransformPair {
                search: unquote(search),
                replace: unquote(&replace),
            });
        }
        Self::from_pairs(pairs)
    }

    /// Append another spec's pairs after this one's
    pub fn extend(&mut self, other: TransformSpec) {
        self.pairs.extend(other.pairs);
    }

    pub fn pairs(&self) -> &[TransformPair] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Apply every pair, in order, to one string
    pub fn apply_str(&self, input: &str) -> String {
        let mut current = input.to_string();
        for pair in &self.pairs {
            if current.contains(pair.search.as_str()) {
                current = current.replace(pair.search.as_str(), &pair.replace);
            }
        }
        current
    }

    /// Human-readable listing used in logs
    pub fn describe(&self) -> String {
        self.pairs
            .iter()
            .map(|p| format!("'{}' -> '{}'", p.search, p.replace))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Split on `delim` outside double quotes, keeping quotes in the pieces
fn split_unquoted(input: &str, delim: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => {
                pieces.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&input[start..]);
    pieces
}

fn unquote(token: &str) -> String {
    let token = token.trim();
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        token[1..token.len() - 1].replace("\\\"", "\"")
    } else {
        token.to_string()
    }
}
