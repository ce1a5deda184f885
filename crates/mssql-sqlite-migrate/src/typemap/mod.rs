//! Type mapping and DEFAULT-expression normalization.
//!
//! The type map is a closed table: any source token outside the accepted set
//! is rejected during introspection, before mapping. DEFAULT normalization is
//! a fixed five-step pipeline whose ordering is load-bearing; reordering the
//! steps changes the observed defaults.

use std::sync::OnceLock;

use regex::Regex;

/// The emitted default for GETDATE-derived expressions.
pub const CURRENT_TIMESTAMP_DEFAULT: &str = "(CURRENT_TIMESTAMP)";

/// Map a source data type token (lowercased) to its SQLite-friendly form.
///
/// Returns `None` for tokens outside the accepted set; the caller turns that
/// into a fatal unsupported-type error with table/column context.
pub fn map_type(data_type: &str) -> Option<String> {
    let mapped = match data_type {
        "timestamp" | "binary" | "varbinary" | "image" | "sql_variant" => "blob",
        "datetime" | "smalldatetime" | "date" | "datetime2" | "time" => "datetime",
        "decimal" | "money" | "smallmoney" => "numeric",
        "tinyint" => "smallint",
        "bigint" => "integer",
        "xml" => "varchar",
        "uniqueidentifier" => "guid",
        "ntext" => "text",
        "nchar" => "char",
        "nvarchar" => "varchar",
        // Accepted as-is.
        "bit" | "int" | "smallint" | "float" | "real" | "varchar" | "char" | "text"
        | "numeric" => data_type,
        _ => return None,
    };
    Some(mapped.to_string())
}

/// Whether a stored column type qualifies an identity column for
/// `integer PRIMARY KEY AUTOINCREMENT`.
pub fn is_integral(data_type: &str) -> bool {
    matches!(
        data_type,
        "tinyint" | "int" | "smallint" | "bigint" | "integer"
    )
}

fn national_literal_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^N('.*')$").unwrap())
}

fn adjust_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^\(N('.*')\)$").unwrap())
}

/// Normalize a raw DEFAULT expression from the source catalog.
///
/// Steps, in order:
/// 1. bool-literal rewrite for `bit`/`int` columns,
/// 2. surrounding-parenthesis strip,
/// 3. national-literal strip,
/// 4. `(N'…')` adjust pass,
/// 5. GETDATE substitution.
///
/// The pipeline is idempotent: normalizing a normalized expression yields the
/// same string.
pub fn normalize_default(raw: &str, data_type: &str) -> String {
    let mut expr = raw.trim().to_string();
    if expr.is_empty() {
        return expr;
    }

    if data_type == "bit" || data_type == "int" {
        if expr == "('False')" {
            expr = "(0)".to_string();
        } else if expr == "('True')" {
            expr = "(1)".to_string();
        }
    }

    expr = strip_parens(&expr);

    if let Some(caps) = national_literal_rx().captures(&expr) {
        expr = caps[1].to_string();
    }

    if let Some(caps) = adjust_rx().captures(&expr) {
        expr = caps[1].to_string();
    }

    if expr.to_uppercase().contains("GETDATE") {
        expr = CURRENT_TIMESTAMP_DEFAULT.to_string();
    }

    expr
}

/// Surrounding-parenthesis strip: a quoted expression is reduced to the span
/// from its first to its last quote; otherwise all parentheses are dropped
/// and, if any were, the remainder is re-wrapped in a single pair.
fn strip_parens(expr: &str) -> String {
    if let (Some(first), Some(last)) = (expr.find('\''), expr.rfind('\'')) {
        if last > first {
            return expr[first..=last].to_string();
        }
    }

    let stripped: String = expr.chars().filter(|c| *c != '(' && *c != ')').collect();
    if stripped.len() != expr.len() {
        format!("({})", stripped)
    } else {
        stripped
    }
}

fn is_single_quoted(expr: &str) -> bool {
    expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'')
}

/// Render the DEFAULT clause value for a normalized expression, or `None`
/// when no DEFAULT should be emitted.
///
/// A default is emitted iff the expression is non-empty and either
/// single-quoted or numeric. A parenthesized numeric (the shape the
/// paren-strip step produces) is emitted bare.
pub fn default_clause(expr: &str) -> Option<String> {
    if expr.is_empty() {
        return None;
    }
    if expr == CURRENT_TIMESTAMP_DEFAULT {
        return Some(expr.to_string());
    }
    if is_single_quoted(expr) {
        return Some(expr.to_string());
    }
    if expr.parse::<f64>().is_ok() {
        return Some(expr.to_string());
    }
    if let Some(inner) = expr
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        if inner.parse::<f64>().is_ok() {
            return Some(inner.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_type_blob_family() {
        for t in ["timestamp", "binary", "varbinary", "image", "sql_variant"] {
            assert_eq!(map_type(t).unwrap(), "blob");
        }
    }

    #[test]
    fn test_map_type_datetime_family() {
        for t in ["datetime", "smalldatetime", "date", "datetime2", "time"] {
            assert_eq!(map_type(t).unwrap(), "datetime");
        }
    }

    #[test]
    fn test_map_type_numeric_family() {
        for t in ["decimal", "money", "smallmoney"] {
            assert_eq!(map_type(t).unwrap(), "numeric");
        }
    }

    #[test]
    fn test_map_type_renames() {
        assert_eq!(map_type("tinyint").unwrap(), "smallint");
        assert_eq!(map_type("bigint").unwrap(), "integer");
        assert_eq!(map_type("xml").unwrap(), "varchar");
        assert_eq!(map_type("uniqueidentifier").unwrap(), "guid");
        assert_eq!(map_type("ntext").unwrap(), "text");
        assert_eq!(map_type("nchar").unwrap(), "char");
        assert_eq!(map_type("nvarchar").unwrap(), "varchar");
    }

    #[test]
    fn test_map_type_unchanged() {
        for t in ["bit", "int", "smallint", "float", "real", "varchar", "char", "text", "numeric"] {
            assert_eq!(map_type(t).unwrap(), t);
        }
    }

    #[test]
    fn test_map_type_rejects_unknown() {
        assert!(map_type("geography").is_none());
        assert!(map_type("hierarchyid").is_none());
        assert!(map_type("").is_none());
    }

    #[test]
    fn test_is_integral() {
        for t in ["tinyint", "int", "smallint", "bigint", "integer"] {
            assert!(is_integral(t));
        }
        assert!(!is_integral("numeric"));
        assert!(!is_integral("varchar"));
    }

    #[test]
    fn test_normalize_bool_literals_on_bit() {
        assert_eq!(normalize_default("('True')", "bit"), "(1)");
        assert_eq!(normalize_default("('False')", "bit"), "(0)");
        assert_eq!(normalize_default("('True')", "int"), "(1)");
        // Other types keep the quoted literal.
        assert_eq!(normalize_default("('True')", "varchar"), "'True'");
    }

    #[test]
    fn test_normalize_paren_strip_numeric() {
        assert_eq!(normalize_default("((0))", "int"), "(0)");
        assert_eq!(normalize_default("(42)", "smallint"), "(42)");
    }

    #[test]
    fn test_normalize_quoted_extraction() {
        assert_eq!(normalize_default("('abc')", "varchar"), "'abc'");
        assert_eq!(normalize_default("(N'hello')", "varchar"), "'hello'");
        assert_eq!(normalize_default("N'hello'", "varchar"), "'hello'");
    }

    #[test]
    fn test_normalize_getdate() {
        assert_eq!(
            normalize_default("(getdate())", "datetime"),
            CURRENT_TIMESTAMP_DEFAULT
        );
        assert_eq!(
            normalize_default("(GETDATE())", "datetime"),
            CURRENT_TIMESTAMP_DEFAULT
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cases = [
            ("('True')", "bit"),
            ("('False')", "int"),
            ("((0))", "int"),
            ("(N'hello')", "varchar"),
            ("N'it''s'", "varchar"),
            ("(getdate())", "datetime"),
            ("('abc')", "varchar"),
            ("", "varchar"),
        ];
        for (raw, ty) in cases {
            let once = normalize_default(raw, ty);
            let twice = normalize_default(&once, ty);
            assert_eq!(once, twice, "pipeline not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_default_clause_quoted() {
        assert_eq!(default_clause("'hello'").unwrap(), "'hello'");
    }

    #[test]
    fn test_default_clause_numeric_emitted_bare() {
        assert_eq!(default_clause("(1)").unwrap(), "1");
        assert_eq!(default_clause("1.5").unwrap(), "1.5");
        assert_eq!(default_clause("(0)").unwrap(), "0");
    }

    #[test]
    fn test_default_clause_current_timestamp() {
        assert_eq!(
            default_clause(CURRENT_TIMESTAMP_DEFAULT).unwrap(),
            CURRENT_TIMESTAMP_DEFAULT
        );
    }

    #[test]
    fn test_default_clause_rejected() {
        assert!(default_clause("").is_none());
        assert!(default_clause("(newid)").is_none());
        assert!(default_clause("abc").is_none());
    }
}
