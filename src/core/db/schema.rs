//! Schema statement builders for the DDL the session issues on behalf of
//! the caller. These are the only places where caller-supplied identifiers
//! are interpolated into SQL text; table, column, and constraint names are
//! trusted input.

/// Builds an idempotent index creation statement. The index name is
/// deterministic: `{table}_{column}`.
pub fn index_statement(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_{column} ON {table}({column});",
        table = table,
        column = column
    )
}

/// Builds an `ALTER TABLE .. ADD CONSTRAINT` statement for a foreign key.
/// `definition` is the raw `FOREIGN KEY (..) REFERENCES ..` text.
pub fn foreign_key_statement(table: &str, constraint: &str, definition: &str) -> String {
    format!(
        "ALTER TABLE {table} ADD CONSTRAINT {constraint} {definition};",
        table = table,
        constraint = constraint,
        definition = definition
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_statement_naming_scheme() {
        assert_eq!(
            index_statement("tbl_example", "customer_id"),
            "CREATE INDEX IF NOT EXISTS tbl_example_customer_id ON tbl_example(customer_id);"
        );
    }

    #[test]
    fn test_foreign_key_statement() {
        assert_eq!(
            foreign_key_statement(
                "orders",
                "fk_orders_customer",
                "FOREIGN KEY (customer_id) REFERENCES customers(id)"
            ),
            "ALTER TABLE orders ADD CONSTRAINT fk_orders_customer \
             FOREIGN KEY (customer_id) REFERENCES customers(id);"
        );
    }
}
