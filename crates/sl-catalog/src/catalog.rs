use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::Field;

// ---------------------------------------------------------------------------
// Catalog hierarchy
// ---------------------------------------------------------------------------

/// Root of the catalog: `System → Database → Schema → Table → Field`.
///
/// A fully-qualified table name has the form `system.database.schema.table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub databases: Vec<Database>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

// ---------------------------------------------------------------------------
// Catalog — codecs and lookup
// ---------------------------------------------------------------------------

/// A loaded catalog plus the codecs to move it between JSON (the editable
/// form) and the binary form consumed by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub root: System,
}

impl Catalog {
    pub fn new(root: System) -> Self {
        Self { root }
    }

    /// Read the JSON rendering from `reader`.
    pub fn read_json(reader: impl Read) -> anyhow::Result<Self> {
        let root: System = serde_json::from_reader(reader)?;
        let catalog = Self { root };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Write the JSON rendering to `writer`.
    pub fn write_json(&self, writer: impl Write) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(writer, &self.root)?;
        Ok(())
    }

    /// Read the binary rendering from `reader`.
    pub fn read_binary(mut reader: impl Read) -> anyhow::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let root: System = bincode::deserialize(&buf)?;
        let catalog = Self { root };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Write the binary rendering to `writer`.
    pub fn write_binary(&self, mut writer: impl Write) -> anyhow::Result<()> {
        let buf = bincode::serialize(&self.root)?;
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Load the binary catalog file the compiler resolves tables against.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("cannot open catalog {}: {e}", path.as_ref().display())
        })?;
        Self::read_binary(std::io::BufReader::new(file))
    }

    /// Resolve a fully-qualified `system.database.schema.table` name.
    pub fn find_table(&self, full_name: &str) -> anyhow::Result<&Table> {
        let parts: Vec<&str> = full_name.split('.').collect();
        let [system, database, schema, table] = parts.as_slice() else {
            anyhow::bail!("table name {full_name:?} is not of the form sys.db.schema.table");
        };

        if self.root.name != *system {
            anyhow::bail!("unknown system {system:?} in table name {full_name:?}");
        }
        self.root
            .databases
            .iter()
            .find(|d| d.name == *database)
            .and_then(|d| d.schemas.iter().find(|s| s.name == *schema))
            .and_then(|s| s.tables.iter().find(|t| t.name == *table))
            .ok_or_else(|| anyhow::anyhow!("unknown table {full_name:?}"))
    }

    /// Resolve a field within a fully-qualified table.
    pub fn find_field(&self, full_table: &str, field: &str) -> anyhow::Result<&Field> {
        let table = self.find_table(full_table)?;
        table
            .fields
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| anyhow::anyhow!("unknown field {field:?} in table {full_table:?}"))
    }

    /// Iterate `(qualified_prefix, table)` pairs for template emission.
    pub fn tables(&self) -> impl Iterator<Item = (String, &Table)> {
        self.root.databases.iter().flat_map(move |d| {
            d.schemas.iter().flat_map(move |s| {
                s.tables.iter().map(move |t| {
                    let prefix =
                        format!("{}_{}_{}_{}", self.root.name, d.name, s.name, t.name);
                    (prefix, t)
                })
            })
        })
    }

    /// Structural invariants: unique field names and at most one time field
    /// per table.
    fn validate(&self) -> anyhow::Result<()> {
        for (_, table) in self.tables() {
            let mut seen = std::collections::HashSet::new();
            let mut time_fields = 0usize;
            for field in &table.fields {
                if !seen.insert(field.name.as_str()) {
                    anyhow::bail!(
                        "duplicate field {:?} in table {:?}",
                        field.name,
                        table.name
                    );
                }
                if field.usage == crate::FieldUsage::Time {
                    time_fields += 1;
                }
            }
            if time_fields > 1 {
                anyhow::bail!("table {:?} declares more than one time field", table.name);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
