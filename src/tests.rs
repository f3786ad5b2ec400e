use serde_json::{Map, Value};

use crate::*;

fn column(id: &str, name: &str) -> Column {
    Column {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn row(id: &str, cells: &[(&str, &str)]) -> Row {
    let mut row = Row {
        id: id.to_string(),
        values: Map::new(),
    };
    for (col_id, value) in cells {
        row.set(col_id, Value::String((*value).to_string()));
    }
    row
}

fn sample_sheet() -> Sheet {
    Sheet {
        id: "s1".to_string(),
        title: "Budget".to_string(),
        columns: vec![column("a", "C1"), column("b", "C2")],
        rows: vec![row("r1", &[("a", "10"), ("b", "x")])],
    }
}

#[test]
fn default_sheet_has_two_columns_and_two_rows() {
    let sheet = Sheet::with_defaults("abc123");

    assert_eq!(sheet.id, "abc123");
    assert_eq!(sheet.title, DEFAULT_TITLE);
    assert_eq!(sheet.columns.len(), 2);
    assert_eq!(sheet.columns[0].name, "Column 1");
    assert_eq!(sheet.columns[1].name, "Column 2");
    assert_eq!(sheet.rows.len(), 2);

    let texts: Vec<String> = sheet
        .rows
        .iter()
        .flat_map(|row| {
            sheet
                .columns
                .iter()
                .map(move |col| cell_text(row.get(&col.id).expect("default cell should exist")))
        })
        .collect();
    assert_eq!(texts, ["Cell 1", "Cell 2", "Cell 3", "Cell 4"]);
}

#[test]
fn default_sheet_ids_are_distinct() {
    let sheet = Sheet::with_defaults("abc123");

    assert_ne!(sheet.columns[0].id, sheet.columns[1].id);
    assert_ne!(sheet.rows[0].id, sheet.rows[1].id);
}

#[test]
fn random_tokens_are_lowercase_base36() {
    let token = random_token();

    assert_eq!(token.len(), 11);
    assert!(
        token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    );
    assert_ne!(token, random_token());
}

#[test]
fn footer_sums_numeric_columns_and_counts_the_rest() {
    let sheet = sample_sheet();
    let footers = compute_footers(&sheet.columns, &sheet.rows);

    assert_eq!(footers.len(), 2);
    assert_eq!(footers[0].column_id, "a");
    assert_eq!(footers[0].kind, FooterKind::Sum(10.0));
    assert_eq!(footers[0].kind.label(), "Sum");
    assert_eq!(footers[0].kind.display_value(), "10");
    assert_eq!(footers[1].column_id, "b");
    assert_eq!(footers[1].kind, FooterKind::Count(1));
    assert_eq!(footers[1].kind.display_value(), "1");
}

#[test]
fn footer_counts_rows_with_missing_cells() {
    let columns = vec![column("a", "C1")];
    let rows = vec![row("r1", &[("a", "1")]), row("r2", &[])];

    let footers = compute_footers(&columns, &rows);
    assert_eq!(footers[0].kind, FooterKind::Count(2));
}

#[test]
fn footer_blank_strings_sum_as_zero() {
    let columns = vec![column("a", "C1")];
    let rows = vec![
        row("r1", &[("a", "")]),
        row("r2", &[("a", "   ")]),
        row("r3", &[("a", "5")]),
    ];

    let footers = compute_footers(&columns, &rows);
    assert_eq!(footers[0].kind, FooterKind::Sum(5.0));
}

#[test]
fn footer_accepts_signed_and_scientific_strings() {
    let columns = vec![column("a", "C1")];
    let rows = vec![
        row("r1", &[("a", "-2.5")]),
        row("r2", &[("a", "1e3")]),
        row("r3", &[("a", " 1.5 ")]),
    ];

    let footers = compute_footers(&columns, &rows);
    assert_eq!(footers[0].kind, FooterKind::Sum(999.0));
}

#[test]
fn footer_json_numbers_force_count() {
    let columns = vec![column("a", "C1")];
    let mut numeric_row = row("r1", &[]);
    numeric_row.set("a", Value::from(10));

    let footers = compute_footers(&columns, &[numeric_row]);
    assert_eq!(footers[0].kind, FooterKind::Count(1));
}

#[test]
fn footer_with_no_rows_sums_to_zero() {
    let columns = vec![column("a", "C1")];

    let footers = compute_footers(&columns, &[]);
    assert_eq!(footers[0].kind, FooterKind::Sum(0.0));
    assert_eq!(footers[0].kind.display_value(), "0");
}

#[test]
fn footer_fractional_sum_keeps_its_decimals() {
    let columns = vec![column("a", "C1")];
    let rows = vec![row("r1", &[("a", "1.25")])];

    let footers = compute_footers(&columns, &rows);
    assert_eq!(footers[0].kind.display_value(), "1.25");
}

#[test]
fn set_cell_replaces_only_the_matching_row() {
    let mut sheet = Sheet {
        rows: vec![
            row("r1", &[("a", "10"), ("b", "x")]),
            row("r2", &[("a", "20"), ("b", "y")]),
        ],
        ..sample_sheet()
    };

    assert!(sheet.set_cell("r1", "a", "99"));
    assert_eq!(cell_text(sheet.rows[0].get("a").unwrap()), "99");
    assert_eq!(cell_text(sheet.rows[0].get("b").unwrap()), "x");
    assert_eq!(cell_text(sheet.rows[1].get("a").unwrap()), "20");
}

#[test]
fn set_cell_on_unknown_row_changes_nothing() {
    let mut sheet = sample_sheet();
    let before = sheet.clone();

    assert!(!sheet.set_cell("missing", "a", "99"));
    assert_eq!(sheet, before);
}

#[test]
fn set_cell_merges_a_key_the_row_never_had() {
    let mut sheet = sample_sheet();

    assert!(sheet.set_cell("r1", "zz", "new"));
    assert_eq!(cell_text(sheet.rows[0].get("zz").unwrap()), "new");
}

#[test]
fn set_cell_under_the_id_key_replaces_the_row_id() {
    let mut sheet = sample_sheet();

    assert!(sheet.set_cell("r1", "id", "r9"));
    assert_eq!(sheet.rows[0].id, "r9");
    assert!(sheet.rows[0].get("id").is_none());

    // The row still serializes with a single "id" key and parses back.
    let blob = sheet.rows_blob().unwrap();
    assert_eq!(blob.matches("\"id\"").count(), 1);
    assert_eq!(parse_rows(&blob).unwrap()[0].id, "r9");
}

#[test]
fn add_and_delete_row() {
    let mut sheet = sample_sheet();

    let id = sheet.add_row();
    assert_eq!(sheet.rows.len(), 2);
    assert!(sheet.rows[1].values.is_empty());

    assert!(sheet.delete_row(&id));
    assert_eq!(sheet.rows.len(), 1);
    assert!(!sheet.delete_row("missing"));
}

#[test]
fn add_column_names_follow_the_count() {
    let mut sheet = sample_sheet();

    sheet.add_column();
    assert_eq!(sheet.columns[2].name, "Column 3");

    // Numbering tracks the current count, so names can repeat after a
    // removal.
    let removed_id = sheet.columns[0].id.clone();
    assert!(sheet.remove_column(&removed_id));
    sheet.add_column();
    assert_eq!(sheet.columns[2].name, "Column 3");
}

#[test]
fn remove_column_keeps_row_values() {
    let mut sheet = sample_sheet();

    assert!(sheet.remove_column("a"));
    assert_eq!(sheet.columns.len(), 1);
    assert!(sheet.rows[0].get("a").is_some());
    assert!(!sheet.remove_column("a"));
}

#[test]
fn rename_column_hits_and_misses() {
    let mut sheet = sample_sheet();

    assert!(sheet.rename_column("a", "Amount"));
    assert_eq!(sheet.columns[0].name, "Amount");
    assert!(!sheet.rename_column("missing", "Nope"));
}

#[test]
fn blobs_round_trip_through_parse() {
    let sheet = sample_sheet();

    let columns_json = sheet.columns_blob().expect("columns should serialize");
    let rows_json = sheet.rows_blob().expect("rows should serialize");

    assert_eq!(
        parse_columns(&columns_json).expect("columns should parse"),
        sheet.columns
    );
    assert_eq!(parse_rows(&rows_json).expect("rows should parse"), sheet.rows);
}

#[test]
fn row_blob_keeps_cell_keys_at_the_top_level() {
    let sheet = sample_sheet();
    let json = sheet.rows_blob().expect("rows should serialize");

    // Flat row objects, no nested values map.
    assert!(json.contains("\"id\":\"r1\""));
    assert!(json.contains("\"a\":\"10\""));
    assert!(!json.contains("values"));
}

#[test]
fn empty_blobs_parse_as_empty_collections() {
    assert_eq!(parse_columns("").expect("blank columns"), Vec::new());
    assert_eq!(parse_rows("   ").expect("blank rows"), Vec::new());
}

#[test]
fn malformed_blobs_are_rejected() {
    assert!(matches!(
        parse_columns("{}"),
        Err(AppError::InvalidSheet { field: "columns", .. })
    ));
    assert!(matches!(
        parse_rows("[42]"),
        Err(AppError::InvalidSheet { field: "data", .. })
    ));
}

#[test]
fn error_responses_carry_the_right_status() {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    let bad_form = AppError::MissingField("cell_value").into_response();
    assert_eq!(bad_form.status(), StatusCode::BAD_REQUEST);

    let missing = AppError::NoSuchSheet("ghost".to_string()).into_response();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let corrupt = parse_columns("{}").expect_err("non-array should fail");
    assert_eq!(
        corrupt.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn escape_html_escapes_markup() {
    assert_eq!(
        escape_html("<b>\"a\" & 'b'</b>"),
        "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
    );
    assert_eq!(escape_html("plain"), "plain");
}

#[test]
fn render_page_shows_cells_footers_and_forms() {
    let sheet = sample_sheet();
    let page = render_page(&sheet, None);

    assert!(page.contains("<title>Budget</title>"));
    assert!(page.contains("value=\"10\""));
    assert!(page.contains("value=\"x\""));
    assert!(page.contains("<em>Sum: </em><span>10</span>"));
    assert!(page.contains("<em>Count: </em><span>1</span>"));
    assert!(page.contains("action=\"/sheet/s1/cells\""));
    assert!(page.contains("action=\"/sheet/s1/title\""));
    assert!(page.contains("name=\"search_string\""));
}

#[test]
fn render_page_escapes_stored_values() {
    let mut sheet = sample_sheet();
    sheet.set_cell("r1", "a", "<script>alert(1)</script>");
    sheet.set_title("Tom & Jerry");

    let page = render_page(&sheet, None);
    assert!(!page.contains("<script>alert(1)</script>"));
    assert!(page.contains("&lt;script&gt;"));
    assert!(page.contains("<title>Tom &amp; Jerry</title>"));
}

#[test]
fn render_page_search_filters_rows_and_footers() {
    let sheet = Sheet {
        rows: vec![
            row("r1", &[("a", "apple"), ("b", "1")]),
            row("r2", &[("a", "banana"), ("b", "2")]),
        ],
        ..sample_sheet()
    };

    let page = render_page(&sheet, Some("App"));
    assert!(page.contains("value=\"apple\""));
    assert!(!page.contains("value=\"banana\""));
    // Footers cover only the displayed row.
    assert!(page.contains("<em>Count: </em><span>1</span>"));
    assert!(page.contains("<em>Sum: </em><span>1</span>"));
    assert!(page.contains("value=\"App\""));
}

#[test]
fn render_page_blank_search_shows_everything() {
    let sheet = sample_sheet();

    let canonical = render_page(&sheet, None);
    let blank = render_page(&sheet, Some("   "));
    assert_eq!(canonical, blank);
}

#[test]
fn store_creates_defaults_then_returns_the_stored_sheet() {
    let store = SheetStore::open_in_memory().expect("store should open");

    let first = store.load_or_create("fresh1").expect("first load");
    assert_eq!(first.title, DEFAULT_TITLE);
    assert_eq!(first.columns.len(), 2);

    let again = store.load_or_create("fresh1").expect("second load");
    assert_eq!(again, first);
}

#[test]
fn store_update_rewrites_the_record() {
    let store = SheetStore::open_in_memory().expect("store should open");
    let sheet = store.load_or_create("edit1").expect("load");
    let row_id = sheet.rows[0].id.clone();
    let col_id = sheet.columns[0].id.clone();

    let matched = store
        .update_with("edit1", |s| s.set_cell(&row_id, &col_id, "42"))
        .expect("update should succeed");
    assert!(matched);

    let reloaded = store.load_or_create("edit1").expect("reload");
    assert_eq!(cell_text(reloaded.rows[0].get(&col_id).unwrap()), "42");
    // Everything else is untouched.
    assert_eq!(
        cell_text(reloaded.rows[1].get(&col_id).unwrap()),
        "Cell 3"
    );
}

#[test]
fn store_survives_a_write_under_the_id_key() {
    let store = SheetStore::open_in_memory().expect("store should open");
    let sheet = store.load_or_create("idkey1").expect("load");
    let row_id = sheet.rows[0].id.clone();

    let matched = store
        .update_with("idkey1", |s| s.set_cell(&row_id, "id", "renamed"))
        .expect("update should succeed");
    assert!(matched);

    // The stored blob still parses, with the row id overwritten.
    let reloaded = store.load_or_create("idkey1").expect("reload");
    assert_eq!(reloaded.rows[0].id, "renamed");
}

#[test]
fn store_update_missing_sheet_fails_without_creating_it() {
    let store = SheetStore::open_in_memory().expect("store should open");

    let err = store
        .update_with("ghost", |s| s.add_row())
        .expect_err("update of a missing sheet should fail");
    assert!(matches!(err, AppError::NoSuchSheet(_)));
    assert!(store.find("ghost").expect("find").is_none());
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let db_path = dir.path().join("sheets.db");

    {
        let store = SheetStore::open_path(&db_path).expect("store should open");
        let sheet = store.load_or_create("disk1").expect("create");
        let row_id = sheet.rows[0].id.clone();
        let col_id = sheet.columns[0].id.clone();
        store
            .update_with("disk1", |s| s.set_cell(&row_id, &col_id, "kept"))
            .expect("update");
    }

    let store = SheetStore::open_path(&db_path).expect("store should reopen");
    let record = store
        .find("disk1")
        .expect("find")
        .expect("record should survive reopen");
    assert!(record.data.contains("kept"));
    assert_eq!(record.parse().expect("parse").columns.len(), 2);
}
