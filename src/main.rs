use sheetpad::app;
use sheetpad::store::SheetStore;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Configuration comes from the environment, with local defaults
    let db_path = env::var("SHEETPAD_DB").unwrap_or_else(|_| "sheetpad.db".to_string());
    let addr = env::var("SHEETPAD_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let store = SheetStore::open_path(&db_path)?;
    println!("Starting sheetpad with database {}", db_path);

    app::run(store, &addr).await
}
