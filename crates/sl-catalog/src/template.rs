use std::path::Path;

use crate::Catalog;

/// Write one CSV header template per table into `dir`.
///
/// The template carries two commented rows, field names and field types,
/// so data producers can line their columns up against the catalog:
///
/// ```text
/// #,t,g,x
/// #,text,text,integer64
/// ```
pub fn write_csv_templates(catalog: &Catalog, dir: impl AsRef<Path>) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    for (prefix, table) in catalog.tables() {
        let path = dir.join(format!("{prefix}.csv"));
        let file = std::fs::File::create(&path)
            .map_err(|e| anyhow::anyhow!("cannot create template {}: {e}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);

        let mut names = vec!["#".to_string()];
        let mut types = vec!["#".to_string()];
        for field in &table.fields {
            names.push(field.name.clone());
            types.push(field.field_type.to_string());
        }
        writer.write_record(&names)?;
        writer.write_record(&types)?;
        writer.flush()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
