use crate::app::SearchService;
use crate::engine::Delivery;
use crate::remote::ProxyReply;
use crate::shell::{DropdownState, DropdownView};
use std::sync::Mutex;
use tauri::{command, AppHandle, Emitter, Manager, State};
use tokio::sync::mpsc;
use tracing::warn;

/// Event carrying a fresh `DropdownView` after each applied delivery.
pub const RESULTS_EVENT: &str = "dx://results";

pub struct AppState {
    pub service: SearchService,
    pub dropdown: Mutex<DropdownState>,
}

impl AppState {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            dropdown: Mutex::new(DropdownState::new()),
        }
    }
}

/* ---------- 1.  LOOKUPS ---------- */

#[command]
pub async fn search_codes(
    search: String,
    state: State<'_, AppState>,
) -> Result<ProxyReply, String> {
    Ok(state.service.proxy(&search).await)
}

#[command]
pub async fn submit_query(
    term: String,
    state: State<'_, AppState>,
) -> Result<u64, String> {
    Ok(state.service.coordinator().submit(&term))
}

/* ---------- 2.  SELECTION ---------- */

#[command]
pub fn select_code(
    code: String,
    state: State<'_, AppState>,
) -> Result<DropdownView, String> {
    let mut dropdown = state.dropdown.lock().map_err(|e| e.to_string())?;
    dropdown
        .select(&code)
        .ok_or_else(|| format!("Code {} is not among the listed options", code))?;
    Ok(dropdown.view())
}

#[command]
pub fn clear_selection(state: State<'_, AppState>) -> Result<DropdownView, String> {
    let mut dropdown = state.dropdown.lock().map_err(|e| e.to_string())?;
    dropdown.clear();
    Ok(dropdown.view())
}

#[command]
pub fn dropdown_view(state: State<'_, AppState>) -> Result<DropdownView, String> {
    let dropdown = state.dropdown.lock().map_err(|e| e.to_string())?;
    Ok(dropdown.view())
}

/* ---------- 3.  DELIVERY PUMP ---------- */

/// Apply coordinator deliveries to the shared dropdown and push them to the webview.
pub async fn forward_deliveries(app: AppHandle, mut deliveries: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = deliveries.recv().await {
        let view = {
            let state = app.state::<AppState>();
            let mut dropdown = match state.dropdown.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !dropdown.apply(delivery) {
                continue;
            }
            dropdown.view()
        };

        if let Err(e) = app.emit(RESULTS_EVENT, &view) {
            warn!("Failed to emit search results: {}", e);
        }
    }
}
