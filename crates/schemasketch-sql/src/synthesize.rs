//! Schema synthesis
//!
//! Materializes the inference table into ordered table descriptors:
//! tables sorted by (database, schema, table) case-insensitively, columns
//! in the order the statement first touched them.

use crate::inference::InferenceTable;
use schemasketch_core::{ColumnSketch, TableSketch};
use tracing::debug;

/// Convert accumulated inference state into table descriptors.
pub fn synthesize(inference: &InferenceTable) -> Vec<TableSketch> {
    let mut tables: Vec<TableSketch> = inference
        .iter()
        .map(|(ident, columns)| TableSketch {
            table: ident.clone(),
            columns: columns
                .iter()
                .map(|(name, inferred)| ColumnSketch {
                    name: name.clone(),
                    column_type: inferred.kind.to_column_type(inferred.length),
                    nullable: inferred.nullable,
                })
                .collect(),
        })
        .collect();

    tables.sort_by(|a, b| a.table.cmp(&b.table));
    debug!(tables = tables.len(), "synthesized schema");
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemasketch_core::{ColumnKind, ColumnType, NameKey, TableIdent};

    #[test]
    fn tables_sort_case_insensitively() {
        let mut inference = InferenceTable::new();
        inference.touch(&TableIdent::with_schema("dbo", "zeta"), &NameKey::new("a"));
        inference.touch(&TableIdent::with_schema("DBO", "Alpha"), &NameKey::new("a"));
        inference.touch(&TableIdent::new("bare"), &NameKey::new("a"));

        let tables = synthesize(&inference);
        let names: Vec<String> = tables.iter().map(|t| t.table.to_string()).collect();
        assert_eq!(names, vec!["bare", "DBO.Alpha", "dbo.zeta"]);
    }

    #[test]
    fn columns_keep_first_seen_order_and_types() {
        let ident = TableIdent::new("T");
        let mut inference = InferenceTable::new();
        inference.touch(&ident, &NameKey::new("Id"));
        inference.touch(&ident, &NameKey::new("FirstName"));
        inference.hint(&ident, &NameKey::new("Total"), ColumnKind::Decimal, None);
        inference.mark_nullable(&ident, &NameKey::new("FirstName"));

        let tables = synthesize(&inference);
        assert_eq!(tables.len(), 1);

        let columns = &tables[0].columns;
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, NameKey::new("Id"));
        assert_eq!(columns[0].column_type, ColumnType::Int32);
        assert!(!columns[0].nullable);

        assert_eq!(columns[1].name, NameKey::new("FirstName"));
        assert_eq!(
            columns[1].column_type,
            ColumnType::String { length: Some(255) }
        );
        assert!(columns[1].nullable);

        assert_eq!(columns[2].column_type, ColumnType::Decimal);
    }

    #[test]
    fn empty_inference_synthesizes_nothing() {
        let inference = InferenceTable::new();
        assert!(synthesize(&inference).is_empty());
    }
}
