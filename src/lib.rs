// Learn more about Tauri commands at https://tauri.app/develop/calling-rust/

pub mod app;
pub mod cache;
pub mod codes;
pub mod config;
pub mod engine;
pub mod remote;
pub mod shell;
pub mod telemetry;

#[cfg(feature = "desktop")]
mod commands;

pub use app::SearchService;
pub use codes::{normalize_term, CodeEntry, LocalTable};
pub use config::AppConfig;
pub use engine::{Delivery, DeliveryPhase, SearchCoordinator, SearchSettings};

#[cfg(feature = "desktop")]
use crate::commands::*;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config = AppConfig::load(None).expect("invalid dxsearch configuration");
    telemetry::init(&config.logging);

    let (service, deliveries) = tauri::async_runtime::block_on(SearchService::build(config))
        .expect("failed to start the search service");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(AppState::new(service))
        .setup(move |app| {
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(forward_deliveries(handle, deliveries));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            search_codes,
            submit_query,
            select_code,
            clear_selection,
            dropdown_view
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
