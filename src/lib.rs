/*!
# sheetpad

A minimal web spreadsheet: visit the root URL, get redirected to a
randomly-named sheet, and start typing. The sheet is created on first
visit and every edit is persisted immediately.

## Architecture

The application is a single server-rendered axum service:

### Web Layer
- **Technologies**: axum, tokio
- **Key Components**:
  - Router mapping a random slug to a sheet resource
  - Form-based mutation endpoints (cell edit, title, rows, columns)
  - Rendered-page cache, cleared whole on any mutation

### Data Layer
- **Technologies**: rusqlite (bundled SQLite), serde_json
- One `sheet` table row per sheet: title plus two JSON text blobs, the
  column definitions and the row records. No relational normalization.

### Rendering
- Server-side HTML built from the parsed sheet: a table of single-input
  forms, per-column sum-or-count footers, and an embedded stylesheet.
  No client-side script.

## Modules

- **sheet**: Sheet/Column/Row model, default sheet, edit operations,
  token generation
- **footer**: per-column sum-or-count aggregation
- **store**: SQLite persistence and the load-or-create path
- **render**: HTML escaping and page rendering
- **app**: state, router and handlers
- **error**: the crate error type and its response mapping

## HTTP Endpoints

- `GET /` - redirect to a fresh random sheet URL
- `GET /sheet/{id}` - render (and lazily create) a sheet; accepts a
  `search_string` query to filter rows
- `POST /sheet/{id}/cells` - save one cell value
- `POST /sheet/{id}/title` - rename the sheet
- `POST /sheet/{id}/rows`, `POST /sheet/{id}/rows/delete` - add or
  remove a row
- `POST /sheet/{id}/columns`, `POST /sheet/{id}/columns/rename`,
  `POST /sheet/{id}/columns/delete` - add, rename or remove a column
- `GET /static/style.css` - the embedded stylesheet
*/

pub mod app;
pub mod error;
pub mod footer;
pub mod render;
pub mod sheet;
pub mod store;

#[cfg(test)]
mod tests;

/// Re-export the model and service types for convenient use
pub use error::*;
pub use footer::*;
pub use render::*;
pub use sheet::*;
pub use store::*;
