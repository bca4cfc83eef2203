use crate::errors::{PilotError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};

/// Case-folds and collapses runs of whitespace, the way labels are compared.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Compiles a text pattern for local matching.
///
/// Patterns run twice: here, through the `regex` crate, and in the page, through
/// `new RegExp(source, flags)`. Only the syntax both engines read the same way
/// is accepted. Case folding travels as a flag, so inline flag groups are
/// rejected, and so are look-around, `(?P<name>)`, `\A`/`\z`, Unicode
/// property classes, braced hex escapes and class set operations. `\d` and
/// `\w` keep their ASCII meaning on both sides.
pub fn compile_portable(source: &str, ignore_case: bool) -> Result<Regex> {
    let local = portable_source(source)
        .map_err(|what| PilotError::InvalidSelector(format!("/{}/: {} is not supported", source, what)))?;
    RegexBuilder::new(&local)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| PilotError::InvalidSelector(format!("/{}/: {}", source, e)))
}

/// The `regex` crate spelling of a page `RegExp` source, or what made it
/// non-portable.
fn portable_source(source: &str) -> std::result::Result<String, &'static str> {
    let mut local = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    local.push(c);
                    break;
                };
                match escaped {
                    'd' => local.push_str(if in_class { "0-9" } else { "[0-9]" }),
                    'w' => local.push_str(if in_class { "0-9A-Za-z_" } else { "[0-9A-Za-z_]" }),
                    'D' if !in_class => local.push_str("[^0-9]"),
                    'W' if !in_class => local.push_str("[^0-9A-Za-z_]"),
                    'D' | 'W' => return Err("a negated class escape inside a class"),
                    'A' | 'z' | 'Z' => return Err("a text anchor escape"),
                    'p' | 'P' => return Err("a Unicode property class"),
                    '<' | '>' => return Err("a word anchor escape"),
                    'x' | 'u' if chars.peek() == Some(&'{') => return Err("a braced hex escape"),
                    'b' if chars.peek() == Some(&'{') => return Err("a special word boundary"),
                    other => {
                        local.push('\\');
                        local.push(other);
                    }
                }
                continue;
            }
            '[' if in_class => {
                return Err(if chars.peek() == Some(&':') {
                    "a POSIX class"
                } else {
                    "a nested class"
                })
            }
            '[' => {
                in_class = true;
                local.push(c);
                if chars.peek() == Some(&'^') {
                    chars.next();
                    local.push('^');
                }
                if chars.peek() == Some(&']') {
                    return Err("an empty class");
                }
                continue;
            }
            ']' if in_class => in_class = false,
            '&' | '-' | '~' if in_class && chars.peek() == Some(&c) => {
                return Err("a class set operation")
            }
            '(' if !in_class && chars.peek() == Some(&'?') => {
                chars.next();
                local.push_str("(?");
                match chars.next() {
                    Some(':') => local.push(':'),
                    Some('=' | '!') => return Err("look-ahead"),
                    Some('<') if matches!(chars.peek(), Some('=' | '!')) => return Err("look-behind"),
                    Some('<') => local.push('<'),
                    Some('P') => return Err("a (?P<name>) group"),
                    _ => return Err("an inline flag group"),
                }
                continue;
            }
            _ => {}
        }
        local.push(c);
    }
    Ok(local)
}

#[derive(Debug, Clone)]
pub enum TextPattern {
    Literal(String),
    Regex {
        regex: Regex,
        source: String,
        ignore_case: bool,
    },
}

impl TextPattern {
    pub fn literal(text: impl Into<String>) -> Self {
        TextPattern::Literal(text.into())
    }

    pub fn regex(source: &str) -> Result<Self> {
        Self::build_regex(source, false)
    }

    pub fn regex_ignore_case(source: &str) -> Result<Self> {
        Self::build_regex(source, true)
    }

    fn build_regex(source: &str, ignore_case: bool) -> Result<Self> {
        let regex = compile_portable(source, ignore_case)?;
        Ok(TextPattern::Regex {
            regex,
            source: source.to_string(),
            ignore_case,
        })
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextPattern::Literal(a), TextPattern::Literal(b)) => a == b,
            (
                TextPattern::Regex {
                    source: a,
                    ignore_case: ai,
                    ..
                },
                TextPattern::Regex {
                    source: b,
                    ignore_case: bi,
                    ..
                },
            ) => a == b && ai == bi,
            _ => false,
        }
    }
}

impl std::fmt::Display for TextPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextPattern::Literal(text) => write!(f, "{}", text),
            TextPattern::Regex {
                source,
                ignore_case,
                ..
            } => write!(f, "/{}/{}", source, if *ignore_case { "i" } else { "" }),
        }
    }
}

impl From<&str> for TextPattern {
    fn from(text: &str) -> Self {
        TextPattern::literal(text)
    }
}

impl From<String> for TextPattern {
    fn from(text: String) -> Self {
        TextPattern::Literal(text)
    }
}

impl Serialize for TextPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(tag = "kind", rename_all = "camelCase")]
        enum Wire<'a> {
            Literal { text: &'a str },
            Regex { source: &'a str, flags: &'a str },
        }

        match self {
            TextPattern::Literal(text) => Wire::Literal {
                text: text.as_str(),
            }
            .serialize(serializer),
            TextPattern::Regex {
                source,
                ignore_case,
                ..
            } => Wire::Regex {
                source: source.as_str(),
                flags: if *ignore_case { "i" } else { "" },
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    Exact,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextQuery {
    pub pattern: TextPattern,
    pub mode: MatchMode,
}

impl TextQuery {
    pub fn new(pattern: TextPattern, mode: MatchMode) -> Self {
        Self { pattern, mode }
    }

    pub fn with_mode(&self, mode: MatchMode) -> Self {
        Self {
            pattern: self.pattern.clone(),
            mode,
        }
    }

    /// Literal patterns compare normalized text; regexes see the raw text and,
    /// in exact mode, must match the whole of it.
    pub fn matches(&self, candidate: &str) -> bool {
        match &self.pattern {
            TextPattern::Literal(text) => {
                let wanted = normalize(text);
                let candidate = normalize(candidate);
                match self.mode {
                    MatchMode::Exact => candidate == wanted,
                    MatchMode::Contains => candidate.contains(&wanted),
                }
            }
            TextPattern::Regex { regex, .. } => match self.mode {
                MatchMode::Exact => regex
                    .find(candidate)
                    .map(|found| found.as_str() == candidate)
                    .unwrap_or(false),
                MatchMode::Contains => regex.is_match(candidate),
            },
        }
    }
}
