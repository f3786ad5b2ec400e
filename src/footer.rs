use serde_json::Value;

use crate::sheet::{Column, Row};

/// Summary line under one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    pub column_id: String,
    pub kind: FooterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FooterKind {
    Sum(f64),
    Count(usize),
}

impl FooterKind {
    pub fn label(&self) -> &'static str {
        match self {
            FooterKind::Sum(_) => "Sum",
            FooterKind::Count(_) => "Count",
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            FooterKind::Sum(total) => format!("{total}"),
            FooterKind::Count(n) => format!("{n}"),
        }
    }
}

/// A cell's numeric reading, if it has one. Only string values qualify;
/// a blank or whitespace-only string reads as zero, anything else must
/// parse as a float. Values stored as JSON numbers do not qualify, so a
/// column holding one falls back to counting.
fn numeric_value(value: &Value) -> Option<f64> {
    let s = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Compute one footer per column over the given rows. A column sums when
/// every row has a numeric value for it, and otherwise counts every row,
/// blanks and missing cells included. With no rows at all every column
/// sums to zero.
pub fn compute_footers(columns: &[Column], rows: &[Row]) -> Vec<Footer> {
    columns
        .iter()
        .map(|col| {
            let mut total = 0.0;
            let mut all_numeric = true;
            for row in rows {
                match row.get(&col.id).and_then(numeric_value) {
                    Some(n) => total += n,
                    None => {
                        all_numeric = false;
                        break;
                    }
                }
            }
            let kind = if all_numeric {
                FooterKind::Sum(total)
            } else {
                FooterKind::Count(rows.len())
            };
            Footer {
                column_id: col.id.clone(),
                kind,
            }
        })
        .collect()
}
