use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::error::AppError;
use crate::render::render_page;
use crate::sheet::random_token;
use crate::store::SheetStore;

/// Shared application state: the persistent store plus the rendered-page
/// cache.
pub struct AppState {
    store: SheetStore,
    page_cache: Mutex<PageCache>,
}

/// Canonical page renders keyed by sheet id. The generation is bumped on
/// every invalidation; a render that sampled an older generation is
/// refused insertion, so a page built from pre-mutation state cannot
/// land in the cache after the mutation cleared it.
struct PageCache {
    generation: u64,
    pages: HashMap<String, String>,
}

impl AppState {
    pub fn new(store: SheetStore) -> Self {
        AppState {
            store,
            page_cache: Mutex::new(PageCache {
                generation: 0,
                pages: HashMap::new(),
            }),
        }
    }

    fn cached_page(&self, sheet_id: &str) -> Option<String> {
        self.page_cache.lock().unwrap().pages.get(sheet_id).cloned()
    }

    fn cache_generation(&self) -> u64 {
        self.page_cache.lock().unwrap().generation
    }

    /// Insert a rendered page, unless an invalidation landed after
    /// `generation` was sampled.
    fn cache_page(&self, sheet_id: &str, page: String, generation: u64) {
        let mut cache = self.page_cache.lock().unwrap();
        if cache.generation == generation {
            cache.pages.insert(sheet_id.to_string(), page);
        }
    }

    /// Any mutation drops every cached page, not just the mutated
    /// sheet's.
    fn invalidate_pages(&self) {
        let mut cache = self.page_cache.lock().unwrap();
        cache.generation += 1;
        cache.pages.clear();
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    search_string: Option<String>,
}

#[derive(Deserialize)]
struct CellForm {
    row_id: Option<String>,
    col_id: Option<String>,
    cell_value: Option<String>,
}

#[derive(Deserialize)]
struct TitleForm {
    sheet_title: Option<String>,
}

#[derive(Deserialize)]
struct RowForm {
    row_id: Option<String>,
}

#[derive(Deserialize)]
struct ColumnForm {
    col_id: Option<String>,
}

#[derive(Deserialize)]
struct RenameColumnForm {
    col_id: Option<String>,
    column_name: Option<String>,
}

/// Pull a required form field, mapping absence to a 400 with no write.
fn require(field: Option<String>, name: &'static str) -> Result<String, AppError> {
    field.ok_or(AppError::MissingField(name))
}

fn sheet_url(id: &str) -> String {
    format!("/sheet/{}", urlencoding::encode(id))
}

/// Build the application router over the given store.
pub fn router(store: SheetStore) -> Router {
    let state = Arc::new(AppState::new(store));

    Router::new()
        .route("/", get(serve_index))
        .route("/sheet/:id", get(serve_sheet))
        .route("/sheet/:id/cells", post(save_cell))
        .route("/sheet/:id/title", post(rename_sheet))
        .route("/sheet/:id/rows", post(add_row))
        .route("/sheet/:id/rows/delete", post(delete_row))
        .route("/sheet/:id/columns", post(add_column))
        .route("/sheet/:id/columns/rename", post(rename_column))
        .route("/sheet/:id/columns/delete", post(delete_column))
        .route("/static/style.css", get(serve_stylesheet))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(store: SheetStore, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(store);

    let listener = TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Every visit to the root gets a fresh random sheet URL. The sheet
/// itself is only created when that URL is first loaded.
async fn serve_index() -> Redirect {
    Redirect::to(&sheet_url(&random_token()))
}

async fn serve_sheet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SearchQuery>,
) -> Result<Html<String>, AppError> {
    let term = params
        .search_string
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    // Only the canonical unfiltered page is cached.
    if term.is_none() {
        if let Some(page) = state.cached_page(&id) {
            log::debug!("sheet {id}: served from page cache");
            return Ok(Html(page));
        }
    }

    // Sample the generation before reading the store, so a mutation
    // that lands mid-render keeps this page out of the cache.
    let generation = state.cache_generation();
    let sheet = state.store.load_or_create(&id)?;
    let page = render_page(&sheet, term);
    if term.is_none() {
        state.cache_page(&id, page.clone(), generation);
    }

    Ok(Html(page))
}

async fn save_cell(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<CellForm>,
) -> Result<Redirect, AppError> {
    let row_id = require(form.row_id, "row_id")?;
    let col_id = require(form.col_id, "col_id")?;
    let cell_value = require(form.cell_value, "cell_value")?;

    let matched = state
        .store
        .update_with(&id, |sheet| sheet.set_cell(&row_id, &col_id, &cell_value))?;
    if matched {
        log::debug!("sheet {id}: cell {row_id}/{col_id} updated");
    } else {
        log::warn!("sheet {id}: cell update matched no row {row_id}");
    }

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn rename_sheet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<TitleForm>,
) -> Result<Redirect, AppError> {
    let title = require(form.sheet_title, "sheet_title")?;

    state.store.update_with(&id, |sheet| sheet.set_title(&title))?;
    log::debug!("sheet {id}: retitled");

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn add_row(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let row_id = state.store.update_with(&id, |sheet| sheet.add_row())?;
    log::debug!("sheet {id}: row {row_id} added");

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn delete_row(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<RowForm>,
) -> Result<Redirect, AppError> {
    let row_id = require(form.row_id, "row_id")?;

    let removed = state
        .store
        .update_with(&id, |sheet| sheet.delete_row(&row_id))?;
    if !removed {
        log::warn!("sheet {id}: delete matched no row {row_id}");
    }

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn add_column(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let col_id = state.store.update_with(&id, |sheet| sheet.add_column())?;
    log::debug!("sheet {id}: column {col_id} added");

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn rename_column(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<RenameColumnForm>,
) -> Result<Redirect, AppError> {
    let col_id = require(form.col_id, "col_id")?;
    let name = require(form.column_name, "column_name")?;

    let matched = state
        .store
        .update_with(&id, |sheet| sheet.rename_column(&col_id, &name))?;
    if !matched {
        log::warn!("sheet {id}: rename matched no column {col_id}");
    }

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn delete_column(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<ColumnForm>,
) -> Result<Redirect, AppError> {
    let col_id = require(form.col_id, "col_id")?;

    let removed = state
        .store
        .update_with(&id, |sheet| sheet.remove_column(&col_id))?;
    if !removed {
        log::warn!("sheet {id}: delete matched no column {col_id}");
    }

    state.invalidate_pages();
    Ok(Redirect::to(&sheet_url(&id)))
}

async fn serve_stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("./static/style.css"),
    )
}
