//! Foreign-key traversal from a primary table to every ancestor table.
//!
//! The walk is depth-first in discovery order. A table is marked visited
//! before its parents are walked, so self-references and cycles terminate,
//! and a table reached along several paths contributes its columns once
//! (first discovery wins).

use super::{quote_ident, same_name, SchemaInspector};
use anyhow::{Context, Result};
use std::fmt;

/// A `table.column` reference selected for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedColumn {
    pub table: String,
    pub column: String,
}

impl QualifiedColumn {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Header label, unquoted
    pub fn label(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    pub fn to_sql(&self) -> String {
        format!("{}.{}", quote_ident(&self.table), quote_ident(&self.column))
    }
}

impl fmt::Display for QualifiedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Equality between one foreign-key column and the column it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    pub child: QualifiedColumn,
    pub parent: QualifiedColumn,
}

impl JoinPredicate {
    pub fn new(child_table: &str, child_column: &str, parent_table: &str, parent_column: &str) -> Self {
        Self {
            child: QualifiedColumn::new(child_table, child_column),
            parent: QualifiedColumn::new(parent_table, parent_column),
        }
    }

    pub fn to_sql(&self) -> String {
        format!("{} = {}", self.child.to_sql(), self.parent.to_sql())
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.child, self.parent)
    }
}

/// Accumulators for one traversal, owned by the caller and threaded through
/// the recursion.
///
/// All three are insertion-ordered so repeated runs over the same schema
/// produce the same columns, predicates and sheet names.
#[derive(Debug, Default, Clone)]
pub struct TraversalState {
    /// Tables in the order they were first reached, starting table first
    pub visited: Vec<String>,
    /// Columns that are not part of any outgoing foreign key
    pub qualified_columns: Vec<QualifiedColumn>,
    /// One predicate per foreign-key column pair
    pub join_predicates: Vec<JoinPredicate>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, table: &str) -> bool {
        self.visited.iter().any(|t| same_name(t, table))
    }
}

/// Walk the foreign-key graph upwards from `table`, accumulating into `state`.
///
/// The table must exist; callers validate that before the walk starts.
pub fn traverse<I>(inspector: &I, table: &str, state: &mut TraversalState) -> Result<()>
where
    I: SchemaInspector + ?Sized,
{
    if state.is_visited(table) {
        return Ok(());
    }
    state.visited.push(table.to_string());

    let foreign_keys = inspector
        .foreign_keys(table)
        .with_context(|| format!("Failed to read foreign keys of {}", table))?;

    let mut fk_columns: Vec<String> = Vec::new();
    let mut parents: Vec<String> = Vec::new();

    for fk in &foreign_keys {
        if !parents.iter().any(|p| same_name(p, &fk.parent_table)) {
            parents.push(fk.parent_table.clone());
        }
        for (child, parent) in fk.column_pairs() {
            state
                .join_predicates
                .push(JoinPredicate::new(table, child, &fk.parent_table, parent));
            if !fk_columns.iter().any(|c| same_name(c, child)) {
                fk_columns.push(child.to_string());
            }
        }
    }

    let columns = inspector
        .columns(table)
        .with_context(|| format!("Failed to read columns of {}", table))?;

    for column in &columns {
        if !fk_columns.iter().any(|c| same_name(c, &column.name)) {
            state
                .qualified_columns
                .push(QualifiedColumn::new(table, &column.name));
        }
    }

    for parent in &parents {
        traverse(inspector, parent, state)?;
    }

    Ok(())
}
