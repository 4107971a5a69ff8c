use tidemark_config::Options;

pub const ID_COLUMN: &str = "id";
pub const IS_ROLLBACK_COLUMN: &str = "is_rollback";

/// Structural description of one tracking-table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub constraints: &'static str,
}

/// Names and sizes of the tracking table, resolved from [`Options`].
///
/// Every statement the record store issues is built from here, so a custom
/// table or version-column name only has to be configured once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable {
    table_name: String,
    version_column: String,
    version_size: u32,
}

impl TrackingTable {
    pub fn from_options(options: &Options) -> Self {
        let options = options.clone().normalized();
        Self {
            table_name: options.table_name,
            version_column: options.version_column_name,
            version_size: options.version_column_size,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn version_column(&self) -> &str {
        &self.version_column
    }

    pub fn version_size(&self) -> u32 {
        self.version_size
    }

    pub fn columns(&self) -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: ID_COLUMN.to_string(),
                sql_type: "INTEGER".to_string(),
                constraints: "PRIMARY KEY AUTOINCREMENT",
            },
            ColumnDef {
                name: self.version_column.clone(),
                sql_type: format!("VARCHAR({})", self.version_size),
                constraints: "NOT NULL UNIQUE",
            },
            ColumnDef {
                name: IS_ROLLBACK_COLUMN.to_string(),
                sql_type: "INTEGER".to_string(),
                constraints: "DEFAULT 0",
            },
        ]
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns()
            .iter()
            .map(|c| {
                format!(
                    "{} {} {}",
                    quote_identifier(&c.name),
                    c.sql_type,
                    c.constraints
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({columns})",
            self.quoted_table()
        )
    }

    pub(crate) fn quoted_table(&self) -> String {
        quote_identifier(&self.table_name)
    }

    pub(crate) fn quoted_version(&self) -> String {
        quote_identifier(&self.version_column)
    }
}

/// Quote an SQL identifier, doubling any embedded quote characters.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
