use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod conversation;
mod gateway;
mod handler;
mod library;
mod model;
mod store;
mod tui;
mod ui;

use app::App;
use config::Config;
use gateway::{HttpGateway, RecommendBackend};
use store::PersistentStore;

#[tokio::main]
async fn main() -> Result<()> {
    let store = PersistentStore::open_default()?;
    init_tracing(store.base_dir());

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let gateway: Arc<dyn RecommendBackend> = Arc::new(HttpGateway::new(config.backend_url()));
    let mut app = App::new(&config, store, gateway);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    tui::restore()?;
    Ok(())
}

/// Log to a file in the data directory; the terminal belongs to the UI.
fn init_tracing(data_dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = std::fs::create_dir_all(data_dir);
    match std::fs::File::create(data_dir.join("lia.log")) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
