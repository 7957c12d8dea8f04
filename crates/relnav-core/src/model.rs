//! The read-only association graph the browser navigates.
//!
//! Tables, columns, primary keys, and associations come from schema
//! introspection (or a saved model file) and never change while a session is
//! open. Every foreign key is represented by **two** [`Association`] edges,
//! one per direction; the non-canonical one carries `reversed = true` and
//! both point at each other through [`Association::reversal`].
//!
//! Join conditions are authored against two fixed aliases: `A` is the
//! association's destination table, `B` its source. Rendering the condition
//! for a reversed edge swaps the aliases, so the loader can always say
//! `From <source> B join <destination> A on <condition>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The cardinality of an association, seen from source to destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// One source row matches at most one destination row, and vice versa.
    OneToOne,
    /// One source row matches many destination rows.
    OneToMany,
    /// Many source rows match one destination row.
    ManyToOne,
    /// Via a link table.
    ManyToMany,
}

impl Cardinality {
    /// The cardinality of the opposite direction.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unquoted.
    pub name: String,
    /// Declared SQL type, informational only.
    pub sql_type: String,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// A table with its columns and primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unquoted.
    pub name: String,
    /// All columns, in select order.
    pub columns: Vec<Column>,
    /// Indices into `columns` forming the primary key; empty if none.
    pub primary_key: Vec<usize>,
}

impl Table {
    /// Create a table. Key columns are named; unknown names are ignored.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        key_columns: &[&str],
    ) -> Self {
        let primary_key = key_columns
            .iter()
            .filter_map(|k| columns.iter().position(|c| c.name == *k))
            .collect();
        Self {
            name: name.into(),
            columns,
            primary_key,
        }
    }

    /// Whether the table has a usable primary key.
    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The primary-key columns, in key order.
    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_key.iter().map(|&i| &self.columns[i])
    }

    /// Position of the column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Identifier of an association within its [`DataModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationId(usize);

impl AssociationId {
    /// The arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One directed edge of a foreign-key relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Edge name; the reverse edge gets an `inverse-` prefix.
    pub name: String,
    /// Source (parent-side) table name.
    pub source: String,
    /// Destination (child-side) table name.
    pub destination: String,
    /// Join condition over aliases `A` (destination) and `B` (source), as
    /// authored on the canonical edge.
    join_condition: String,
    /// Cardinality from source to destination.
    pub cardinality: Cardinality,
    /// Destination rows must exist before source rows (dependency order).
    pub insert_destination_before_source: bool,
    /// Source rows must exist before destination rows.
    pub insert_source_before_destination: bool,
    /// Whether this is the non-canonical direction of the relationship.
    pub reversed: bool,
    /// The opposite edge.
    pub reversal: AssociationId,
}

impl Association {
    /// The join condition rendered for this edge's direction.
    ///
    /// On a reversed edge the stored text still names the canonical aliases,
    /// so `A` and `B` are swapped token-wise before use.
    #[must_use]
    pub fn join_condition(&self) -> String {
        if self.reversed {
            swap_aliases(&self.join_condition)
        } else {
            self.join_condition.clone()
        }
    }
}

/// Definition of a foreign-key relationship, before it is split into its two
/// directed edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDef {
    /// Canonical edge name.
    pub name: String,
    /// Parent-side table.
    pub source: String,
    /// Child-side table.
    pub destination: String,
    /// Join condition over aliases `A` (destination) and `B` (source).
    pub join_condition: String,
    /// Cardinality from source to destination.
    pub cardinality: Cardinality,
}

/// Tables plus the association arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataModel {
    tables: BTreeMap<String, Table>,
    associations: Vec<Association>,
}

impl DataModel {
    /// An empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any previous definition of the same name.
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Look up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// All tables, ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Add a relationship, materializing both directed edges.
    ///
    /// Returns `(canonical, reversed)` edge ids. The reversed edge swaps
    /// source/destination and dependency flags and reverses the cardinality.
    pub fn add_association(&mut self, def: AssociationDef) -> (AssociationId, AssociationId) {
        let forward_id = AssociationId(self.associations.len());
        let reverse_id = AssociationId(self.associations.len() + 1);

        // A child row depends on its parent: for 1:n the destination rows
        // reference the source and must be inserted after it.
        let dest_depends_on_source = matches!(
            def.cardinality,
            Cardinality::OneToMany | Cardinality::OneToOne
        );

        self.associations.push(Association {
            name: def.name.clone(),
            source: def.source.clone(),
            destination: def.destination.clone(),
            join_condition: def.join_condition.clone(),
            cardinality: def.cardinality,
            insert_destination_before_source: !dest_depends_on_source,
            insert_source_before_destination: dest_depends_on_source,
            reversed: false,
            reversal: reverse_id,
        });
        self.associations.push(Association {
            name: format!("inverse-{}", def.name),
            source: def.destination,
            destination: def.source,
            join_condition: def.join_condition,
            cardinality: def.cardinality.reverse(),
            insert_destination_before_source: dest_depends_on_source,
            insert_source_before_destination: !dest_depends_on_source,
            reversed: true,
            reversal: forward_id,
        });

        (forward_id, reverse_id)
    }

    /// The association with the given id.
    ///
    /// Ids come from this model; an unknown id is a caller bug.
    #[must_use]
    pub fn association(&self, id: AssociationId) -> &Association {
        &self.associations[id.0]
    }

    /// All edges leaving `table`.
    pub fn associations_from<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (AssociationId, &'a Association)> {
        self.associations
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.source == table)
            .map(|(i, a)| (AssociationId(i), a))
    }

    /// Load a model from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Custom(format!("invalid data model: {e}")))
    }

    /// Serialize the model to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Custom(format!("cannot serialize data model: {e}")))
    }
}

/// Swap the `A` and `B` aliases in a join condition.
///
/// Token-aware: only bare `A.` / `B.` references are swapped, and quoted
/// string literals are left alone.
fn swap_aliases(condition: &str) -> String {
    let mut out = String::with_capacity(condition.len());
    let chars: Vec<char> = condition.chars().collect();
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            i += 1;
            continue;
        }
        if !in_string && (c == 'A' || c == 'B') && chars.get(i + 1) == Some(&'.') {
            let boundary_before = i == 0
                || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_' || chars[i - 1] == '"');
            if boundary_before {
                out.push(if c == 'A' { 'B' } else { 'A' });
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}
