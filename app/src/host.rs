//! Stand-in for the windowing toolkit layer
//!
//! The bootstrap layer drives the toolkit through `WindowHost`; until the
//! UI is wired in, this host records the driven transitions in the log.

use loglens_core::WindowHost;

#[derive(Default)]
pub struct HeadlessHost;

impl WindowHost for HeadlessHost {
    fn create_window(&mut self, window_id: &str) {
        tracing::info!(window_id, "Window created");
    }

    fn restore_geometry(&mut self, window_id: &str, geometry: &[u8]) {
        tracing::debug!(window_id, bytes = geometry.len(), "Window geometry restored");
    }

    fn resize(&mut self, window_id: &str, width: u32, height: u32) {
        tracing::info!(window_id, width, height, "Window resized");
    }

    fn load_file(&mut self, window_id: &str, file_name: &str, follow: bool) {
        tracing::info!(window_id, file_name, follow, "File loaded");
    }
}
