//! Line-oriented document templates
//!
//! ```text
//! # Temporary Voter Authority Certificate
//! Name: {{ elector_name }}
//! Valid on: {{ valid_on_date }}
//! ```
//!
//! A line starting with `# ` is a heading. `{{ key }}` is replaced with the
//! value mapped to `key`; every token must have a value.

use crate::models::Placeholders;
use crate::validation::ValidationError;

use super::RenderError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateLine {
    heading: bool,
    segments: Vec<Segment>,
}

/// One filled-in line ready for layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub heading: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Template {
    path: String,
    lines: Vec<TemplateLine>,
}

impl Template {
    pub fn parse(path: &str, source: &str) -> Result<Self, RenderError> {
        let mut lines = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let (heading, body) = match raw.strip_prefix("# ") {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let segments = parse_segments(body).map_err(|reason| RenderError::Malformed {
                path: path.to_string(),
                line: index + 1,
                reason,
            })?;
            lines.push(TemplateLine { heading, segments });
        }

        Ok(Self {
            path: path.to_string(),
            lines,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Placeholder keys in order of first appearance
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = Vec::new();
        for line in &self.lines {
            for segment in &line.segments {
                if let Segment::Token(key) = segment {
                    if !tokens.contains(&key.as_str()) {
                        tokens.push(key);
                    }
                }
            }
        }
        tokens
    }

    /// Substitute every token; the first unmapped one is an error
    pub fn fill(&self, placeholders: &Placeholders) -> Result<Vec<RenderedLine>, ValidationError> {
        if let Some(missing) = self
            .tokens()
            .into_iter()
            .find(|key| !placeholders.contains_key(*key))
        {
            return Err(ValidationError::TemplateMissingValue {
                template: self.path.clone(),
                key: missing.to_string(),
            });
        }

        Ok(self
            .lines
            .iter()
            .map(|line| RenderedLine {
                heading: line.heading,
                text: line
                    .segments
                    .iter()
                    .map(|segment| match segment {
                        Segment::Text(text) => text.as_str(),
                        Segment::Token(key) => placeholders[key].as_str(),
                    })
                    .collect(),
            })
            .collect())
    }
}

fn parse_segments(mut rest: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or_else(|| "unclosed '{{'".to_string())?;
        let key = after_open[..close].trim();
        if key.is_empty() || key.contains(char::is_whitespace) || key.contains("{{") {
            return Err(format!("invalid placeholder '{{{{{}}}}}'", &after_open[..close]));
        }
        segments.push(Segment::Token(key.to_string()));
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }

    Ok(segments)
}
