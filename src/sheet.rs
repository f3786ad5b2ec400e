use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Title given to a sheet created on first visit.
pub const DEFAULT_TITLE: &str = "New Sheet";

// Lowercase base-36 keeps slugs short and URL-safe.
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 11;

/// Generate a short opaque identifier, used for sheet slugs as well as
/// column and row ids.
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// A named field definition. The id keys every row's value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
}

/// One row: its own id plus a map of column-id to cell value. Serialized
/// flat, so the JSON form is `{"id":"r1","<col id>":"..."}` exactly as the
/// stored blobs have it. Values are meant to be scalars but that is not
/// enforced anywhere, matching the stored data's loose shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Row {
    pub fn empty() -> Self {
        Row {
            id: random_token(),
            values: Map::new(),
        }
    }

    pub fn get(&self, col_id: &str) -> Option<&Value> {
        self.values.get(col_id)
    }

    /// Write one value under a column id. The serialized row is a single
    /// flat object, so the `id` key is the row id itself: writing it
    /// replaces the id. Letting it into the value map would persist a
    /// row with two `id` keys, which no longer parses.
    pub fn set(&mut self, col_id: &str, value: Value) {
        if col_id == "id" {
            self.id = match value {
                Value::String(s) => s,
                other => cell_text(&other),
            };
            return;
        }
        self.values.insert(col_id.to_string(), value);
    }
}

/// Text a cell renders as. Missing values render empty; the loose shapes
/// the data model tolerates get their plain JSON form.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// In-memory form of one spreadsheet document.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub id: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Sheet {
    /// The sheet a first visit materializes: two columns, two rows, fixed
    /// labels, fresh ids.
    pub fn with_defaults(id: &str) -> Self {
        let columns = vec![
            Column {
                id: random_token(),
                name: "Column 1".to_string(),
            },
            Column {
                id: random_token(),
                name: "Column 2".to_string(),
            },
        ];

        let labels = [["Cell 1", "Cell 2"], ["Cell 3", "Cell 4"]];
        let rows = labels
            .iter()
            .map(|pair| {
                let mut row = Row::empty();
                for (col, text) in columns.iter().zip(pair.iter()) {
                    row.set(&col.id, Value::String((*text).to_string()));
                }
                row
            })
            .collect();

        Sheet {
            id: id.to_string(),
            title: DEFAULT_TITLE.to_string(),
            columns,
            rows,
        }
    }

    /// Merge one cell value into the row with the matching id. Returns
    /// whether any row matched; a miss is not an error, the caller still
    /// rewrites the (unchanged) collection.
    pub fn set_cell(&mut self, row_id: &str, col_id: &str, value: &str) -> bool {
        for row in &mut self.rows {
            if row.id == row_id {
                row.set(col_id, Value::String(value.to_string()));
                return true;
            }
        }
        false
    }

    /// Append an empty row and return its id.
    pub fn add_row(&mut self) -> String {
        let row = Row::empty();
        let id = row.id.clone();
        self.rows.push(row);
        id
    }

    /// Remove the row with the matching id. Returns whether one existed.
    pub fn delete_row(&mut self, row_id: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != row_id);
        self.rows.len() != before
    }

    /// Append a column named after the new column count and return its id.
    pub fn add_column(&mut self) -> String {
        let column = Column {
            id: random_token(),
            name: format!("Column {}", self.columns.len() + 1),
        };
        let id = column.id.clone();
        self.columns.push(column);
        id
    }

    pub fn rename_column(&mut self, col_id: &str, name: &str) -> bool {
        for column in &mut self.columns {
            if column.id == col_id {
                column.name = name.to_string();
                return true;
            }
        }
        false
    }

    /// Remove the column definition only. Row values stored under the
    /// removed id stay in the blob; the subset invariant is intended, not
    /// enforced.
    pub fn remove_column(&mut self, col_id: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|column| column.id != col_id);
        self.columns.len() != before
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn columns_blob(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.columns)?)
    }

    pub fn rows_blob(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.rows)?)
    }
}

/// Parse the stored `columns` blob. An empty blob reads as no columns;
/// anything that is not an array of `{id, name}` objects is fatal for
/// the request.
pub fn parse_columns(json: &str) -> Result<Vec<Column>, AppError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|source| AppError::InvalidSheet {
        field: "columns",
        source,
    })
}

/// Parse the stored `data` blob into rows. Same leniency for an empty
/// blob; a non-array or an array of non-objects is fatal.
pub fn parse_rows(json: &str) -> Result<Vec<Row>, AppError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|source| AppError::InvalidSheet {
        field: "data",
        source,
    })
}
