//! Statement shapes and fallback strategies.
//!
//! Two independent cascades keep loading working across backends:
//!
//! - **Restriction**: how a block of parents is folded into the statement.
//!   Chosen up front from the dialect and the block, never probed.
//! - **Cap**: how the row limit is enforced server-side. Probed in order at
//!   execution time; a strategy that the backend rejects falls through to
//!   the next one, down to plain client-side truncation.
//!
//! A probe failure is internal and never surfaced. Only [`Error::Sql`] and
//! [`Error::Connection`] returned by the session during a probe count as
//! fallback triggers; cancellation and missing-key errors always propagate.
//!
//! When a block carries parents, the statement additionally selects the
//! source's key columns under aliases `"p0"`, `"p1"`, … so every result row
//! can be attributed to the parent that produced it. These trail the target
//! columns; readers rely on position, not names.

use relnav_core::{Dialect, Error, Table, Value};

use crate::blocks::Block;
use crate::rowid;

/// How a block's parents restrict the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionStrategy {
    /// The synthetic placeholder block: no restriction at all.
    NoParents,
    /// A disjunction of per-parent identifying predicates over alias `B`.
    RowIdDisjunction,
    /// A literal key-tuple table joined in place of the source table.
    InlineView,
}

/// How the row limit is enforced, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStrategy {
    /// The dialect's native limit clause.
    LimitSuffix,
    /// `row_number() over()` inside an inline-view wrapper.
    RowNumberInlineView,
    /// `row_number() over()` appended to the predicate.
    RowNumberPlain,
    /// No server-side cap; the sink stops reading.
    ClientSide,
}

/// Whether an execution error may be swallowed by a strategy probe.
#[must_use]
pub fn is_fallback_trigger(error: &Error) -> bool {
    matches!(error, Error::Sql(_) | Error::Connection(_))
}

/// The cap strategies worth probing for `dialect`, most specific first.
/// Always ends with client-side truncation, which cannot fail.
#[must_use]
pub fn cap_plan(dialect: &Dialect) -> Vec<CapStrategy> {
    let mut plan = Vec::with_capacity(4);
    if dialect.limit_suffix.is_some() {
        plan.push(CapStrategy::LimitSuffix);
    }
    if dialect.supports_row_number {
        plan.push(CapStrategy::RowNumberInlineView);
        plan.push(CapStrategy::RowNumberPlain);
    }
    plan.push(CapStrategy::ClientSide);
    plan
}

/// Pick the restriction strategy for one block.
///
/// The inline view carries only the source's key columns, so it is only
/// usable when the join condition references nothing else of `B`.
#[must_use]
pub fn choose_restriction(
    dialect: &Dialect,
    source: Option<&Table>,
    join_condition: Option<&str>,
    block: &Block<'_>,
) -> RestrictionStrategy {
    if block.is_placeholder() {
        return RestrictionStrategy::NoParents;
    }
    if block.parents.len() == 1 || dialect.inline_view.is_none() {
        return RestrictionStrategy::RowIdDisjunction;
    }
    if let (Some(source), Some(condition)) = (source, join_condition) {
        let key_names: Vec<&str> = source.pk_columns().map(|c| c.name.as_str()).collect();
        let all_keyed = referenced_source_columns(condition, dialect.quote)
            .iter()
            .all(|c| key_names.contains(&c.as_str()));
        if all_keyed {
            return RestrictionStrategy::InlineView;
        }
    }
    RestrictionStrategy::RowIdDisjunction
}

/// Column names referenced through alias `B` in a join condition.
fn referenced_source_columns(condition: &str, quote: char) -> Vec<String> {
    let mut columns = Vec::new();
    let chars: Vec<char> = condition.chars().collect();
    let mut i = 0;
    while i + 2 < chars.len() {
        let boundary = i == 0
            || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_' || chars[i - 1] == quote);
        if boundary && chars[i] == 'B' && chars[i + 1] == '.' && chars[i + 2] == quote {
            let mut j = i + 3;
            let mut name = String::new();
            while j < chars.len() && chars[j] != quote {
                name.push(chars[j]);
                j += 1;
            }
            columns.push(name);
            i = j;
        }
        i += 1;
    }
    columns
}

/// The dialect-independent core of one block statement, before a cap
/// strategy is applied.
#[derive(Debug, Clone)]
pub struct CoreStatement {
    /// Rendered select items: `A`-qualified target columns, then aliased
    /// parent-key columns.
    select_items: Vec<String>,
    /// Quoted output column names, in item order, for wrapper re-selection.
    output_names: Vec<String>,
    /// Number of leading items that belong to the target table.
    target_width: usize,
    /// The FROM clause, including the join when loading via an association.
    from: String,
    /// The WHERE clause content, if any.
    where_sql: Option<String>,
}

/// Build the core statement for one block.
///
/// `source`/`join_condition` are present iff loading through an association;
/// `condition` is the free-form restriction over alias `A`. Deduplication is
/// entirely client-side (by rowId), so no `distinct` ever reaches the
/// statement; suppressed-duplicate accounting stays exact that way.
pub fn build_core(
    dialect: &Dialect,
    target: &Table,
    source: Option<&Table>,
    join_condition: Option<&str>,
    block: &Block<'_>,
    restriction: RestrictionStrategy,
    condition: Option<&str>,
) -> Result<CoreStatement, Error> {
    let mut select_items: Vec<String> = Vec::with_capacity(target.columns.len() + 2);
    let mut output_names: Vec<String> = Vec::with_capacity(target.columns.len() + 2);
    for column in &target.columns {
        let quoted = dialect.quote_ident(&column.name);
        select_items.push(format!("A.{quoted}"));
        output_names.push(quoted);
    }
    let target_width = select_items.len();

    let target_name = dialect.quote_ident(&target.name);
    let mut where_parts: Vec<String> = Vec::new();

    let from = match (source, join_condition) {
        (Some(source), Some(join)) => {
            if !block.is_placeholder() {
                for (i, column) in source.pk_columns().enumerate() {
                    let alias = dialect.quote_ident(&format!("p{i}"));
                    select_items.push(format!("B.{} {alias}", dialect.quote_ident(&column.name)));
                    output_names.push(alias);
                }
            }
            let source_sql = match restriction {
                RestrictionStrategy::InlineView => {
                    let key_columns: Vec<String> =
                        source.pk_columns().map(|c| c.name.clone()).collect();
                    let tuples = key_tuples(source, block)?;
                    dialect
                        .render_inline_view("B", &key_columns, &tuples)
                        .ok_or_else(|| {
                            Error::Custom("inline view chosen without dialect support".to_string())
                        })?
                }
                _ => format!("{} B", dialect.quote_ident(&source.name)),
            };
            if restriction == RestrictionStrategy::RowIdDisjunction {
                where_parts.push(disjunction(dialect, source, block, "B")?);
            }
            format!("{source_sql} join {target_name} A on {join}")
        }
        _ => {
            if restriction == RestrictionStrategy::RowIdDisjunction {
                // Re-querying rows of the target table itself: the parents
                // live under the only alias there is.
                where_parts.push(disjunction(dialect, target, block, "A")?);
            }
            format!("{target_name} A")
        }
    };

    if let Some(condition) = condition {
        let trimmed = condition.trim();
        if !trimmed.is_empty() {
            where_parts.push(format!("({trimmed})"));
        }
    }

    let where_sql = if where_parts.is_empty() {
        None
    } else {
        Some(where_parts.join(" and "))
    };

    Ok(CoreStatement {
        select_items,
        output_names,
        target_width,
        from,
        where_sql,
    })
}

/// The parents' key tuples, or `MissingPrimaryKey` if any parent cannot be
/// identified.
fn key_tuples(source: &Table, block: &Block<'_>) -> Result<Vec<Vec<Value>>, Error> {
    block
        .parents
        .iter()
        .map(|(_, parent)| {
            if parent.has_stable_id() {
                Ok(parent.primary_key.iter().map(|(_, v)| v.clone()).collect())
            } else {
                Err(Error::MissingPrimaryKey {
                    table: source.name.clone(),
                })
            }
        })
        .collect()
}

/// `((pred) or (pred) or …)` over the block's parents, under `alias`.
fn disjunction(
    dialect: &Dialect,
    source: &Table,
    block: &Block<'_>,
    alias: &str,
) -> Result<String, Error> {
    let mut predicates = Vec::with_capacity(block.parents.len());
    for (_, parent) in &block.parents {
        if !parent.has_stable_id() {
            return Err(Error::MissingPrimaryKey {
                table: source.name.clone(),
            });
        }
        predicates.push(format!(
            "({})",
            rowid::render_predicate(dialect, &parent.primary_key, Some(alias))
        ));
    }
    Ok(format!("({})", predicates.join(" or ")))
}

impl CoreStatement {
    /// Number of leading result columns that belong to the target table;
    /// anything after them is parent-key attribution.
    #[must_use]
    pub fn target_width(&self) -> usize {
        self.target_width
    }

    /// Render the statement under one cap strategy.
    ///
    /// `fetch` is the number of rows actually requested, which is the
    /// caller's remaining budget plus the one probe row.
    #[must_use]
    pub fn render(&self, cap: CapStrategy, fetch: usize, dialect: &Dialect) -> String {
        let select_list = self.select_items.join(", ");
        let where_sql = self
            .where_sql
            .as_ref()
            .map(|w| format!(" Where {w}"))
            .unwrap_or_default();
        let plain = format!("Select {select_list} From {}{where_sql}", self.from);
        match cap {
            CapStrategy::ClientSide => plain,
            CapStrategy::LimitSuffix => {
                // cap_plan only offers this when the dialect has a template.
                let suffix = dialect.render_limit(fetch).unwrap_or_default();
                format!("{plain} {suffix}")
            }
            CapStrategy::RowNumberInlineView => {
                let inner = format!(
                    "Select {select_list}, row_number() over() {} From {}{where_sql}",
                    dialect.quote_ident("rn"),
                    self.from,
                );
                format!(
                    "Select {} From ({inner}) RNQ Where {} <= {fetch}",
                    self.output_names.join(", "),
                    dialect.quote_ident("rn")
                )
            }
            CapStrategy::RowNumberPlain => {
                let connector = if self.where_sql.is_some() {
                    " and"
                } else {
                    " Where"
                };
                format!("{plain}{connector} row_number() over() <= {fetch}")
            }
        }
    }

    /// Render the bounded counting variant of the statement.
    #[must_use]
    pub fn render_count(&self, dialect: &Dialect) -> String {
        let where_sql = self
            .where_sql
            .as_ref()
            .map(|w| format!(" Where {w}"))
            .unwrap_or_default();
        format!(
            "Select count(*) {} From {}{where_sql}",
            dialect.quote_ident("c"),
            self.from
        )
    }
}
