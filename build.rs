fn main() {
    println!("cargo:rerun-if-changed=tauri.conf.json");

    // The webview shell is optional; the search pipeline builds without it.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
