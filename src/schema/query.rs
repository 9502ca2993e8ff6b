//! Query building for the joined export of a primary table.

use super::{quote_ident, traverse, JoinPredicate, QualifiedColumn, SchemaInspector, TraversalState};
use crate::error::ExportError;
use anyhow::Result;

/// Default separator between table names in a joined sheet name
pub const DEFAULT_SHEET_SEPARATOR: &str = "&";

/// Everything needed to export one primary table joined with its ancestors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportUnit {
    /// Participating tables in discovery order, primary table first
    pub tables: Vec<String>,
    /// Selected columns in discovery order
    pub columns: Vec<QualifiedColumn>,
    /// Join predicates in discovery order
    pub predicates: Vec<JoinPredicate>,
}

impl ExportUnit {
    /// Validate that `primary` exists, then walk its foreign keys.
    pub fn resolve<I>(inspector: &I, primary: &str) -> Result<Self>
    where
        I: SchemaInspector + ?Sized,
    {
        if inspector.object_kind(primary)?.is_none() {
            return Err(ExportError::NoSuchTable(primary.to_string()).into());
        }

        let mut state = TraversalState::new();
        traverse(inspector, primary, &mut state)?;
        Ok(Self::from_state(state))
    }

    pub fn from_state(state: TraversalState) -> Self {
        Self {
            tables: state.visited,
            columns: state.qualified_columns,
            predicates: state.join_predicates,
        }
    }

    pub fn primary(&self) -> &str {
        self.tables.first().map(String::as_str).unwrap_or_default()
    }

    /// Ancestor tables joined onto the primary table
    pub fn joined_tables(&self) -> &[String] {
        self.tables.get(1..).unwrap_or_default()
    }

    /// Header labels (`table.column`) in select order
    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(QualifiedColumn::label).collect()
    }

    pub fn sheet_name(&self, separator: &str) -> String {
        self.tables.join(separator)
    }

    /// Build the SELECT statement.
    ///
    /// All predicates are ANDed into the ON clause of the last join, so that
    /// clause spans every participating table. Earlier joins carry `ON TRUE`.
    /// Predicates on a self-reference are dropped when no other table joins.
    pub fn to_sql(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(ExportError::NoColumns(self.primary().to_string()).into());
        }

        let columns: Vec<String> = self.columns.iter().map(QualifiedColumn::to_sql).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(self.primary())
        );

        let joined = self.joined_tables();
        if let Some((last, rest)) = joined.split_last() {
            for table in rest {
                sql.push_str(&format!(" INNER JOIN {} ON TRUE", quote_ident(table)));
            }
            let conditions: Vec<String> = self.predicates.iter().map(JoinPredicate::to_sql).collect();
            let on = if conditions.is_empty() {
                "TRUE".to_string()
            } else {
                conditions.join(" AND ")
            };
            sql.push_str(&format!(" INNER JOIN {} ON {}", quote_ident(last), on));
        }

        Ok(sql)
    }
}

/// Query for a verbatim table or view export
pub fn select_all(name: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(name))
}
