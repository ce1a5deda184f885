//! Core building blocks shared across the conversion pipeline.

pub mod identifier;
pub mod schema;
pub mod value;

pub use self::schema::{
    CaseSensitivity, Column, Database, ForeignKey, Index, IndexColumn, Table, Trigger,
    TriggerEvent, TriggerTiming, View,
};
pub use self::value::{Affinity, SqlValue};
