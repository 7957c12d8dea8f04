//! Backend capability descriptor.
//!
//! A [`Dialect`] describes which SQL constructs a backend accepts, so the
//! loader can pick a statement shape instead of probing blindly. A capability
//! flag being present is still no guarantee: drivers lie, which is why the
//! loader additionally falls back on execution failure.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// How a backend spells a literal row list usable as a pseudo-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineViewStyle {
    /// `(values (1, 'a'), (2, 'b')) B("id", "name")`
    Values,
    /// `(Select 1 "id", 'a' "name" Union all Select 2, 'b') B`
    UnionAll,
}

/// Capabilities and spelling rules of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialect {
    /// Backend name, for logging only.
    pub name: String,
    /// Identifier quote character.
    pub quote: char,
    /// Row-limit clause template appended to a statement, containing `%s`
    /// for the limit. `None` if the backend has no native limit syntax.
    pub limit_suffix: Option<String>,
    /// Inline-view support, if any.
    pub inline_view: Option<InlineViewStyle>,
    /// Whether `row_number() over()` is accepted.
    pub supports_row_number: bool,
}

impl Dialect {
    /// A fully capable dialect with ANSI spelling.
    #[must_use]
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quote: '"',
            limit_suffix: Some("limit %s".to_string()),
            inline_view: Some(InlineViewStyle::Values),
            supports_row_number: true,
        }
    }

    /// A dialect with no optional capabilities at all.
    ///
    /// Everything still works against such a backend; the loader just does
    /// more client-side.
    #[must_use]
    pub fn minimal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quote: '"',
            limit_suffix: None,
            inline_view: None,
            supports_row_number: false,
        }
    }

    /// Quote an identifier.
    #[must_use]
    pub fn quote_ident(&self, ident: &str) -> String {
        format!("{q}{ident}{q}", q = self.quote)
    }

    /// Render a value as a SQL literal.
    #[must_use]
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => {
                if d.fract() == 0.0 && d.is_finite() {
                    format!("{d:.1}")
                } else {
                    d.to_string()
                }
            }
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("x'{hex}'")
            }
        }
    }

    /// Render the native limit clause for `limit` rows, if supported.
    #[must_use]
    pub fn render_limit(&self, limit: usize) -> Option<String> {
        self.limit_suffix
            .as_ref()
            .map(|template| template.replace("%s", &limit.to_string()))
    }

    /// Render an inline view materializing `tuples` under `alias` with the
    /// given column names, if the backend supports one.
    #[must_use]
    pub fn render_inline_view(
        &self,
        alias: &str,
        columns: &[String],
        tuples: &[Vec<Value>],
    ) -> Option<String> {
        if tuples.is_empty() {
            return None;
        }
        match self.inline_view? {
            InlineViewStyle::Values => {
                let rows: Vec<String> = tuples
                    .iter()
                    .map(|t| {
                        let vals: Vec<String> = t.iter().map(|v| self.literal(v)).collect();
                        format!("({})", vals.join(", "))
                    })
                    .collect();
                let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
                Some(format!(
                    "(values {}) {alias}({})",
                    rows.join(", "),
                    cols.join(", ")
                ))
            }
            InlineViewStyle::UnionAll => {
                let selects: Vec<String> = tuples
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let vals: Vec<String> = t
                            .iter()
                            .enumerate()
                            .map(|(c, v)| {
                                // Column aliases only on the first branch.
                                if i == 0 {
                                    format!("{} {}", self.literal(v), self.quote_ident(&columns[c]))
                                } else {
                                    self.literal(v)
                                }
                            })
                            .collect();
                        format!("Select {}", vals.join(", "))
                    })
                    .collect();
                Some(format!("({}) {alias}", selects.join(" Union all ")))
            }
        }
    }
}
