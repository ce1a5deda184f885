//! Identifier quoting and INSERT parameter naming.
//!
//! SQL identifiers cannot be passed as parameters in prepared statements, so
//! dynamic DDL and DML quote them instead. Both SQL Server and SQLite accept
//! bracket quoting, which keeps the emitted SQL uniform across the two ends
//! of the conversion.

/// Quote an identifier with brackets, escaping embedded closing brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Qualify a source table reference. The schema part is emitted bare and the
/// table bracketed, matching the reads the source server receives.
pub fn qualify_source_table(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, quote_ident(table))
}

/// Derive deterministic `@`-prefixed parameter names for a list of columns.
///
/// Every character outside `[A-Za-z0-9_]` is replaced with `_`. Collisions
/// within the statement are resolved by suffixing `_` until the name is
/// unique, so the same input column list always yields the same sequence.
pub fn parameter_names(columns: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(columns.len());

    for col in columns {
        let mut sanitized: String = col
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();

        while names.contains(&sanitized) {
            sanitized.push('_');
        }
        names.push(sanitized);
    }

    names.iter().map(|n| format!("@{}", n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_normal() {
        assert_eq!(quote_ident("Users"), "[Users]");
        assert_eq!(quote_ident("my table"), "[my table]");
    }

    #[test]
    fn test_quote_ident_escapes_bracket() {
        assert_eq!(quote_ident("a]b"), "[a]]b]");
    }

    #[test]
    fn test_qualify_source_table() {
        assert_eq!(qualify_source_table("dbo", "Orders"), "dbo.[Orders]");
    }

    #[test]
    fn test_parameter_names_sanitize() {
        let cols = vec!["Id".to_string(), "First Name".to_string(), "a-b".to_string()];
        assert_eq!(parameter_names(&cols), vec!["@Id", "@First_Name", "@a_b"]);
    }

    #[test]
    fn test_parameter_names_resolve_collisions() {
        let cols = vec!["a b".to_string(), "a-b".to_string(), "a_b".to_string()];
        assert_eq!(parameter_names(&cols), vec!["@a_b", "@a_b_", "@a_b__"]);
    }

    #[test]
    fn test_parameter_names_deterministic() {
        let cols = vec!["x y".to_string(), "x_y".to_string()];
        assert_eq!(parameter_names(&cols), parameter_names(&cols));
    }
}
