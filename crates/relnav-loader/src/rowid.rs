//! Row identification predicates.
//!
//! A rowId is a literal-equality predicate over the primary-key columns,
//! rendered once per row during loading. The predicate doubles as the dedup
//! key and as a restriction fragment when the row later acts as a parent, so
//! rendering must be deterministic.

use relnav_core::{Dialect, SqlRow, Table, Value};

/// Compute the key tuple of `row` for `table`, if the table has a usable
/// primary key and every key column is present in the result.
#[must_use]
pub fn key_tuple(table: &Table, row: &SqlRow) -> Option<Vec<(String, Value)>> {
    if !table.has_primary_key() {
        return None;
    }
    let mut tuple = Vec::with_capacity(table.primary_key.len());
    for column in table.pk_columns() {
        let value = row.get_named(&column.name)?;
        tuple.push((column.name.clone(), value.clone()));
    }
    Some(tuple)
}

/// Render the NULL-safe identifying predicate for a key tuple.
///
/// `alias` qualifies the column references, e.g. for restricting parents
/// under alias `B`.
#[must_use]
pub fn render_predicate(
    dialect: &Dialect,
    key: &[(String, Value)],
    alias: Option<&str>,
) -> String {
    let parts: Vec<String> = key
        .iter()
        .map(|(column, value)| {
            let col = match alias {
                Some(a) => format!("{a}.{}", dialect.quote_ident(column)),
                None => dialect.quote_ident(column),
            };
            if value.is_null() {
                format!("{col} is null")
            } else {
                format!("{col}={}", dialect.literal(value))
            }
        })
        .collect();
    parts.join(" and ")
}

/// The synthetic id assigned to row number `seq` of a keyless table.
///
/// Synthetic ids are unique within one load but cannot be re-queried.
#[must_use]
pub fn synthetic_row_id(seq: usize) -> String {
    format!("#{seq}")
}
