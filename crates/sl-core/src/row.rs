use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use sl_catalog::{Field, FieldUsage};

use crate::value::Value;

// ---------------------------------------------------------------------------
// RowLayout
// ---------------------------------------------------------------------------

/// Plan-driven row layout: the ordered column list of one stage plus the
/// lookup tables the marshalling loop needs. Derived from the plan at
/// engine start; no reflection, no generated code.
#[derive(Debug, Clone)]
pub struct RowLayout {
    columns: Vec<Field>,
    index: HashMap<String, usize>,
    time_index: Option<usize>,
    /// Positions of the `group by` fields in the payload, declared order.
    group_indexes: Vec<usize>,
}

impl RowLayout {
    pub fn new(fields: &[Field], group_fields: &[Field]) -> anyhow::Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                anyhow::bail!("duplicate field {:?} in row layout", field.name);
            }
        }
        let time_index = fields.iter().position(|f| f.usage == FieldUsage::Time);
        let mut group_indexes = Vec::with_capacity(group_fields.len());
        for g in group_fields {
            let i = index
                .get(&g.name)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("group field {:?} missing from layout", g.name))?;
            group_indexes.push(i);
        }
        Ok(Self {
            columns: fields.to_vec(),
            index,
            time_index,
            group_indexes,
        })
    }

    pub fn columns(&self) -> &[Field] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn time_index(&self) -> Option<usize> {
        self.time_index
    }

    pub fn group_indexes(&self) -> &[usize] {
        &self.group_indexes
    }
}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

/// Row between ingress and the window. Carries the group values and the
/// pre-parsed event time so partitioning never re-parses payload fields.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRow {
    pub group: Vec<Value>,
    pub payload: Vec<Value>,
    pub event_time: Option<DateTime<FixedOffset>>,
}

/// Row between the aggregate stage and project.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub group: Vec<Value>,
    pub payload: Vec<Value>,
}

/// Row between project and egress.
#[derive(Debug, Clone, PartialEq)]
pub struct EgressRow {
    pub group: Vec<Value>,
    pub payload: Vec<Value>,
}

/// Group key: the string-formatted group values concatenated in declared
/// order. Never interpreted structurally.
pub fn group_key(group: &[Value]) -> String {
    let mut key = String::new();
    for value in group {
        key.push_str(&value.to_string());
    }
    key
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sl_catalog::FieldType;

    #[test]
    fn layout_resolves_indexes() {
        let fields = vec![
            Field::new("t", FieldType::Text, FieldUsage::Time),
            Field::new("g", FieldType::Text, FieldUsage::Group),
            Field::new("x", FieldType::Integer64, FieldUsage::Data),
        ];
        let group = vec![fields[1].clone()];
        let layout = RowLayout::new(&fields, &group).unwrap();

        assert_eq!(layout.len(), 3);
        assert_eq!(layout.index_of("x"), Some(2));
        assert_eq!(layout.time_index(), Some(0));
        assert_eq!(layout.group_indexes(), &[1]);
    }

    #[test]
    fn layout_rejects_unknown_group_field() {
        let fields = vec![Field::new("x", FieldType::Integer64, FieldUsage::Data)];
        let group = vec![Field::new("g", FieldType::Text, FieldUsage::Group)];
        assert!(RowLayout::new(&fields, &group).is_err());
    }

    #[test]
    fn group_key_concatenates_in_order() {
        let key = group_key(&[Value::Text("a".into()), Value::Int(7)]);
        assert_eq!(key, "a7");
    }

    #[test]
    fn empty_group_key_is_empty() {
        assert_eq!(group_key(&[]), "");
    }
}
