//! Field merging across a base table and its joins.
//!
//! A combined view lists the user-facing fields of every participating table. Display names
//! stay bare unless the same column name (case-insensitive) appears in more than one
//! participant, in which case every colliding field is qualified with a shortened table name.
//! Participants whose shortened names coincide are told apart by an ordinal.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::model::{DataTable, Field, JoinSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedField {
    #[serde(flatten)]
    pub field: Field,
    pub source_table_id: Uuid,
    pub display_name: String,
}

impl CombinedField {
    pub fn id(&self) -> Uuid { self.field.id }

    pub fn is_qualified(&self) -> bool { self.display_name != self.field.name }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombinedFields {
    pub fields: Vec<CombinedField>,
    pub count: usize,
}

impl CombinedFields {
    pub fn get(&self, field_id: &Uuid) -> Option<&CombinedField> {
        self.fields.iter().find(|f| &f.field.id == field_id)
    }
}

pub fn compute_combined_fields(base: &DataTable, joins: &[JoinSpec], tables: &[DataTable]) -> CombinedFields {
    let mut participants: Vec<&DataTable> = vec![base];
    for join in joins {
        match tables.iter().find(|t| t.id == join.right_table_id) {
            Some(t) => participants.push(t),
            None => warn!(target: "framequery::fields", table = %join.right_table_id, "join references unknown table; dropped"),
        }
    }

    let mut key_counts: HashMap<String, usize> = HashMap::new();
    for table in &participants {
        let keys: HashSet<String> = visible(table).map(collision_key).collect();
        for k in keys {
            *key_counts.entry(k).or_default() += 1;
        }
    }

    let qualifiers = participant_qualifiers(&participants);
    let mut fields = Vec::new();
    for (table, short) in participants.iter().zip(&qualifiers) {
        for field in visible(table) {
            let collides = key_counts.get(&collision_key(field)).copied().unwrap_or(0) > 1;
            let display_name = if collides { format!("{}.{}", short, field.name) } else { field.name.clone() };
            fields.push(CombinedField { field: field.clone(), source_table_id: table.id, display_name });
        }
    }
    let count = fields.len();
    CombinedFields { fields, count }
}

/// Shortened table name per participant. A name already taken by an earlier participant
/// (self-joins, imports that shorten alike) gets an ordinal: `staff`, `staff (2)`.
fn participant_qualifiers(participants: &[&DataTable]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    participants
        .iter()
        .map(|table| {
            let short = shorten_table_name(&table.name);
            let mut qualifier = short.clone();
            let mut ordinal = 1;
            while !used.insert(qualifier.to_lowercase()) {
                ordinal += 1;
                qualifier = format!("{} ({})", short, ordinal);
            }
            qualifier
        })
        .collect()
}

fn visible(table: &DataTable) -> impl Iterator<Item = &Field> {
    table.fields.iter().filter(|f| !f.is_internal())
}

fn collision_key(field: &Field) -> String {
    field.column().to_lowercase()
}

static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:csv|json|tsv|parquet|xlsx)$").expect("static regex"));

static GENERATED_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[_\- ](?:",
        r"\d{10,13}",
        r"|\d{4}-?\d{2}-?\d{2}(?:[T_ \-]?\d{2}[\-:]?\d{2}(?:[\-:]?\d{2})?)?",
        r"|(?P<hex>[0-9a-fA-F]{6,})",
        r")$"
    ))
    .expect("static regex")
});

/// Strip import-generated decoration (file extension, timestamp or hash suffixes) from a
/// table name. Names that would end up empty are returned unchanged.
pub fn shorten_table_name(name: &str) -> String {
    let mut current = FILE_EXTENSION.replace(name, "").into_owned();
    while let Some(caps) = GENERATED_SUFFIX.captures(&current) {
        if let Some(hex) = caps.name("hex") {
            if !hex.as_str().bytes().any(|b| b.is_ascii_digit()) {
                break;
            }
        }
        let Some(whole) = caps.get(0) else { break };
        let cut = whole.start();
        if cut == 0 {
            break;
        }
        current.truncate(cut);
    }
    let trimmed = current.trim_end_matches(['_', '-', ' ']);
    if trimmed.is_empty() { name.to_string() } else { trimmed.to_string() }
}
