//! FK-emulation trigger synthesis.
//!
//! The destination does not enforce declarative foreign keys, so each foreign
//! key is compiled into three BEFORE triggers: insert and update checks on
//! the referencing table, and a delete check (or cascade) on the referenced
//! table. Trigger names are deterministic functions of the key's columns,
//! which keeps them unique across the output file.

use crate::core::schema::{ForeignKey, Table, Trigger, TriggerEvent, TriggerTiming};

fn trigger_name(prefix: &str, fk: &ForeignKey) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        prefix, fk.table_name, fk.column_name, fk.foreign_table_name, fk.foreign_column_name
    )
}

/// The guard + existence check shared by the insert and update triggers.
fn reference_check_body(fk: &ForeignKey, action: &str, name: &str) -> String {
    let null_guard = if fk.is_nullable {
        format!(" NEW.{} IS NOT NULL AND", fk.column_name)
    } else {
        String::new()
    };

    format!(
        "SELECT RAISE(ROLLBACK, '{action} on table {table} violates foreign key constraint {name}') \
         WHERE{null_guard} (SELECT {fcol} FROM {ftable} WHERE {fcol} = NEW.{col}) IS NULL;",
        action = action,
        table = fk.table_name,
        name = name,
        null_guard = null_guard,
        fcol = fk.foreign_column_name,
        ftable = fk.foreign_table_name,
        col = fk.column_name,
    )
}

/// Synthesize the three triggers enforcing one foreign key.
pub fn foreign_key_triggers(fk: &ForeignKey) -> Vec<Trigger> {
    let fki_name = trigger_name("fki", fk);
    let fku_name = trigger_name("fku", fk);
    let fkd_name = trigger_name("fkd", fk);

    let insert = Trigger {
        name: fki_name.clone(),
        timing: TriggerTiming::Before,
        event: TriggerEvent::Insert,
        table: fk.table_name.clone(),
        body: reference_check_body(fk, "insert", &fki_name),
    };

    let update = Trigger {
        name: fku_name.clone(),
        timing: TriggerTiming::Before,
        event: TriggerEvent::Update,
        table: fk.table_name.clone(),
        body: reference_check_body(fk, "update", &fku_name),
    };

    let delete_body = if fk.cascade_on_delete {
        format!(
            "DELETE FROM [{table}] WHERE {col} = OLD.{fcol};",
            table = fk.table_name,
            col = fk.column_name,
            fcol = fk.foreign_column_name,
        )
    } else {
        format!(
            "SELECT RAISE(ROLLBACK, 'delete on table {ftable} violates foreign key constraint {name}') \
             WHERE (SELECT {col} FROM {table} WHERE {col} = OLD.{fcol}) IS NOT NULL;",
            ftable = fk.foreign_table_name,
            name = fkd_name,
            col = fk.column_name,
            table = fk.table_name,
            fcol = fk.foreign_column_name,
        )
    };

    let delete = Trigger {
        name: fkd_name,
        timing: TriggerTiming::Before,
        event: TriggerEvent::Delete,
        // The delete check fires on the referenced table.
        table: fk.foreign_table_name.clone(),
        body: delete_body,
    };

    vec![insert, update, delete]
}

/// Synthesize the FK-emulation triggers for every foreign key of a table.
pub fn table_triggers(table: &Table) -> Vec<Trigger> {
    table
        .foreign_keys
        .iter()
        .flat_map(foreign_key_triggers)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fk(nullable: bool, cascade: bool) -> ForeignKey {
        ForeignKey {
            table_name: "T".into(),
            column_name: "parent".into(),
            foreign_table_name: "P".into(),
            foreign_column_name: "id".into(),
            cascade_on_delete: cascade,
            is_nullable: nullable,
        }
    }

    #[test]
    fn test_three_triggers_with_deterministic_names() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert_eq!(triggers.len(), 3);
        assert_eq!(triggers[0].name, "fki_T_parent_P_id");
        assert_eq!(triggers[1].name, "fku_T_parent_P_id");
        assert_eq!(triggers[2].name, "fkd_T_parent_P_id");
    }

    #[test]
    fn test_insert_and_update_fire_before_on_referencing_table() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert_eq!(triggers[0].timing, TriggerTiming::Before);
        assert_eq!(triggers[0].event, TriggerEvent::Insert);
        assert_eq!(triggers[0].table, "T");
        assert_eq!(triggers[1].event, TriggerEvent::Update);
        assert_eq!(triggers[1].table, "T");
    }

    #[test]
    fn test_delete_fires_on_referenced_table() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert_eq!(triggers[2].event, TriggerEvent::Delete);
        assert_eq!(triggers[2].table, "P");
    }

    #[test]
    fn test_nullable_column_guards_the_check() {
        let triggers = foreign_key_triggers(&make_fk(true, false));
        assert!(
            triggers[0]
                .body
                .contains("WHERE NEW.parent IS NOT NULL AND "),
            "body: {}",
            triggers[0].body
        );
        assert!(triggers[1].body.contains("NEW.parent IS NOT NULL AND"));
    }

    #[test]
    fn test_non_nullable_column_has_no_guard() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert!(!triggers[0].body.contains("IS NOT NULL AND"));
        assert!(triggers[0].body.contains("WHERE (SELECT id FROM P"));
    }

    #[test]
    fn test_messages_name_the_action() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert!(triggers[0].body.contains("'insert on table T"));
        assert!(triggers[1].body.contains("'update on table T"));
        assert!(triggers[2].body.contains("'delete on table P"));
    }

    #[test]
    fn test_cascade_delete_body() {
        let triggers = foreign_key_triggers(&make_fk(false, true));
        assert_eq!(triggers[2].body, "DELETE FROM [T] WHERE parent = OLD.id;");
    }

    #[test]
    fn test_non_cascade_delete_raises() {
        let triggers = foreign_key_triggers(&make_fk(false, false));
        assert!(triggers[2].body.starts_with("SELECT RAISE(ROLLBACK,"));
        assert!(triggers[2]
            .body
            .contains("(SELECT parent FROM T WHERE parent = OLD.id) IS NOT NULL;"));
    }

    #[test]
    fn test_table_triggers_cover_all_fks() {
        let table = Table {
            schema: "dbo".into(),
            name: "T".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![make_fk(false, false), make_fk(true, true)],
            indexes: vec![],
        };
        assert_eq!(table_triggers(&table).len(), 6);
    }
}
