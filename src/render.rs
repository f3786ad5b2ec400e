use crate::footer::{Footer, compute_footers};
use crate::sheet::{Row, Sheet, cell_text};

/// Escape text for safe inclusion in HTML body or attribute positions.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Form action URL for a sheet endpoint, e.g. `action(id, "/cells")`.
fn action(sheet_id: &str, tail: &str) -> String {
    format!("/sheet/{}{}", urlencoding::encode(sheet_id), tail)
}

/// Whether any cell of `row` under the given columns contains `needle`.
/// `needle` must already be lowercased; matching is case-insensitive.
fn row_matches(row: &Row, sheet: &Sheet, needle: &str) -> bool {
    sheet.columns.iter().any(|col| {
        row.get(&col.id)
            .map(|value| cell_text(value).to_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

/// Render the full sheet page.
///
/// With a non-blank `search` term only matching rows are shown and the
/// footers are computed over those rows; otherwise the canonical page
/// renders every row.
///
/// # Arguments
/// * `sheet` - The sheet to render
/// * `search` - Raw `search_string` query value, if the request had one
///
/// # Returns
/// * `String` - Complete HTML document
pub fn render_page(sheet: &Sheet, search: Option<&str>) -> String {
    let term = search.map(str::trim).filter(|t| !t.is_empty());

    // 1) filter rows when searching
    let filtered: Option<Vec<Row>> = term.map(|t| {
        let needle = t.to_lowercase();
        sheet
            .rows
            .iter()
            .filter(|row| row_matches(row, sheet, &needle))
            .cloned()
            .collect()
    });
    let visible: &[Row] = filtered.as_deref().unwrap_or(&sheet.rows);

    // 2) footers reflect what is displayed
    let footers = compute_footers(&sheet.columns, visible);

    // 3) build the body and inject it into the page shell
    let mut body = String::new();
    body.push_str(&render_header(sheet, term));
    body.push_str(&render_table(sheet, visible, &footers));
    body.push_str(&render_actions(&sheet.id));

    include_str!("./static/sheet.html")
        .replace("<!-- page_title -->", &escape_html(&sheet.title))
        .replace("<!-- sheet_body -->", &body)
}

/// Title form plus the search form.
fn render_header(sheet: &Sheet, search: Option<&str>) -> String {
    let mut header = String::new();
    header.push_str("<header>\n");
    header.push_str(&format!(
        "  <form method=\"post\" action=\"{}\">\n    <h1><input type=\"text\" name=\"sheet_title\" value=\"{}\" title=\"Spreadsheet title\" aria-label=\"Spreadsheet title\"></h1>\n  </form>\n",
        action(&sheet.id, "/title"),
        escape_html(&sheet.title),
    ));
    header.push_str(&format!(
        "  <form method=\"get\" action=\"{}\">\n    <input type=\"text\" placeholder=\"Search\" name=\"search_string\" value=\"{}\" title=\"Search in spreadsheet\" aria-label=\"Search in spreadsheet\">\n  </form>\n",
        action(&sheet.id, ""),
        escape_html(search.unwrap_or("")),
    ));
    header.push_str("</header>\n");
    header
}

fn render_table(sheet: &Sheet, rows: &[Row], footers: &[Footer]) -> String {
    let mut table = String::new();
    table.push_str("<table>\n");

    // Header row: one rename form and one remove button per column, plus
    // an empty cell over the delete-row column.
    table.push_str("  <thead>\n    <tr>\n");
    for col in &sheet.columns {
        table.push_str(&format!(
            "      <th>\n        <form method=\"post\" action=\"{rename}\">\n          <input type=\"hidden\" name=\"col_id\" value=\"{id}\">\n          <input type=\"text\" name=\"column_name\" value=\"{name}\" title=\"Edit column name\" aria-label=\"Edit column name\">\n        </form>\n        <form method=\"post\" action=\"{delete}\">\n          <input type=\"hidden\" name=\"col_id\" value=\"{id}\">\n          <button class=\"tertiary small\" title=\"Remove column\" aria-label=\"Remove column\">x</button>\n        </form>\n      </th>\n",
            rename = action(&sheet.id, "/columns/rename"),
            delete = action(&sheet.id, "/columns/delete"),
            id = escape_html(&col.id),
            name = escape_html(&col.name),
        ));
    }
    table.push_str("      <th></th>\n    </tr>\n  </thead>\n");

    // Body: every visible cell is its own single-input form so plain
    // enter-to-submit works without any client script.
    table.push_str("  <tbody>\n");
    for row in rows {
        table.push_str("    <tr>\n");
        for col in &sheet.columns {
            let value = row.get(&col.id).map(cell_text).unwrap_or_default();
            table.push_str(&format!(
                "      <td>\n        <form method=\"post\" action=\"{cells}\">\n          <input type=\"hidden\" name=\"row_id\" value=\"{row_id}\">\n          <input type=\"hidden\" name=\"col_id\" value=\"{col_id}\">\n          <input type=\"text\" name=\"cell_value\" value=\"{value}\" title=\"Edit cell value\" aria-label=\"Edit cell value\">\n        </form>\n      </td>\n",
                cells = action(&sheet.id, "/cells"),
                row_id = escape_html(&row.id),
                col_id = escape_html(&col.id),
                value = escape_html(&value),
            ));
        }
        table.push_str(&format!(
            "      <td>\n        <form method=\"post\" action=\"{delete}\">\n          <input type=\"hidden\" name=\"row_id\" value=\"{row_id}\">\n          <button class=\"small\" title=\"Delete row\" aria-label=\"Delete row\">x</button>\n        </form>\n      </td>\n    </tr>\n",
            delete = action(&sheet.id, "/rows/delete"),
            row_id = escape_html(&row.id),
        ));
    }
    table.push_str("  </tbody>\n");

    // Footer row: sum or count per column.
    table.push_str("  <tfoot>\n    <tr>\n");
    for footer in footers {
        table.push_str(&format!(
            "      <td><em>{}: </em><span>{}</span></td>\n",
            footer.kind.label(),
            footer.kind.display_value(),
        ));
    }
    table.push_str("      <td></td>\n    </tr>\n  </tfoot>\n</table>\n");

    table
}

fn render_actions(sheet_id: &str) -> String {
    format!(
        "<div>\n  <form method=\"post\" action=\"{rows}\">\n    <button title=\"Add row\" aria-label=\"add row\">Add row</button>\n  </form>\n  <form method=\"post\" action=\"{columns}\">\n    <button title=\"Add column\" aria-label=\"add column\">Add column</button>\n  </form>\n</div>\n",
        rows = action(sheet_id, "/rows"),
        columns = action(sheet_id, "/columns"),
    )
}
