//! Session data structures

use serde::{Deserialize, Serialize};

/// One annotation/marker record on a file's visual timeline.
///
/// Opaque at this layer: the payload belongs to the timeline view and is
/// only guaranteed to round-trip losslessly through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineNode(pub serde_json::Value);

/// One log source open within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFile {
    /// Path/identifier of the log source
    pub file_name: String,
    /// Line index at the top of the view, for scroll restore
    pub top_line: u64,
    /// View-specific parameters (layout etc.), stored verbatim
    pub view_context: String,
    /// Timeline annotations, stored verbatim
    pub timeline_nodes: Vec<TimelineNode>,
}

impl OpenFile {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            top_line: 0,
            view_context: String::new(),
            timeline_nodes: Vec::new(),
        }
    }
}

/// One top-level window tracked by caller-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Unique within the session, assigned by the caller
    pub id: String,
    /// Toolkit geometry blob, stored verbatim and never interpreted
    pub geometry: Vec<u8>,
    /// Open files in display/tab order
    pub open_files: Vec<OpenFile>,
}

impl Window {
    fn new(id: String) -> Self {
        Self {
            id,
            geometry: Vec::new(),
            open_files: Vec::new(),
        }
    }
}

/// Result of a window removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    /// The last remaining window is never removed
    RefusedLastWindow,
}

/// The full persisted record of all windows and their open files.
///
/// Windows keep insertion order (creation order). Unknown window ids on
/// accessors are a defined no-op / empty-result, not an error: windows can
/// close asynchronously relative to background persistence timers, and a
/// lost race must not break the save path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    windows: Vec<Window>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a window entry if absent; adding an existing id is a no-op.
    pub fn add(&mut self, window_id: &str) {
        if self.find_window(window_id).is_none() {
            self.windows.push(Window::new(window_id.to_string()));
            tracing::info!(window_id = %window_id, "Created window session entry");
        }
    }

    /// Remove a window, refusing to empty the session.
    pub fn remove(&mut self, window_id: &str) -> RemoveOutcome {
        if self.windows.len() <= 1 {
            return RemoveOutcome::RefusedLastWindow;
        }

        match self.windows.iter().position(|w| w.id == window_id) {
            Some(index) => {
                self.windows.remove(index);
                tracing::info!(window_id = %window_id, "Removed window session entry");
                RemoveOutcome::Removed
            }
            None => RemoveOutcome::NotFound,
        }
    }

    /// Window ids in creation order.
    pub fn windows(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.id.clone()).collect()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Geometry blob for a window; empty for an unknown id.
    pub fn geometry(&self, window_id: &str) -> Vec<u8> {
        self.find_window(window_id)
            .map(|w| w.geometry.clone())
            .unwrap_or_default()
    }

    /// Silently ignored for an unknown id.
    pub fn set_geometry(&mut self, window_id: &str, geometry: Vec<u8>) {
        if let Some(window) = self.find_window_mut(window_id) {
            window.geometry = geometry;
        }
    }

    /// Open files for a window in tab order; empty for an unknown id.
    pub fn open_files(&self, window_id: &str) -> Vec<OpenFile> {
        self.find_window(window_id)
            .map(|w| w.open_files.clone())
            .unwrap_or_default()
    }

    /// Wholesale replace of a window's file list; silently ignored for an
    /// unknown id.
    pub fn set_open_files(&mut self, window_id: &str, open_files: Vec<OpenFile>) {
        if let Some(window) = self.find_window_mut(window_id) {
            window.open_files = open_files;
        }
    }

    pub(crate) fn window_entries(&self) -> &[Window] {
        &self.windows
    }

    pub(crate) fn push_window(&mut self, window: Window) {
        self.windows.push(window);
    }

    fn find_window(&self, window_id: &str) -> Option<&Window> {
        let window = self.windows.iter().find(|w| w.id == window_id);
        if window.is_none() {
            tracing::debug!(window_id = %window_id, "Can't find window");
        }
        window
    }

    fn find_window_mut(&mut self, window_id: &str) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == window_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut session = Session::new();

        session.add("w1");
        session.add("w2");
        session.add("w1");

        assert_eq!(session.windows(), vec!["w1", "w2"]);
    }

    #[test]
    fn test_remove_keeps_last_window() {
        let mut session = Session::new();
        session.add("w1");
        session.set_open_files(
            "w1",
            vec![OpenFile::new("a.log"), OpenFile::new("b.log")],
        );

        assert_eq!(session.remove("w1"), RemoveOutcome::RefusedLastWindow);
        assert_eq!(session.windows(), vec!["w1"]);
        assert_eq!(session.open_files("w1").len(), 2);
    }

    #[test]
    fn test_remove_outcomes() {
        let mut session = Session::new();
        session.add("w1");
        session.add("w2");

        assert_eq!(session.remove("nope"), RemoveOutcome::NotFound);
        assert_eq!(session.remove("w1"), RemoveOutcome::Removed);
        assert_eq!(session.windows(), vec!["w2"]);

        // Back down to one window, removal is refused regardless of id
        assert_eq!(session.remove("w2"), RemoveOutcome::RefusedLastWindow);
        assert_eq!(session.remove("nope"), RemoveOutcome::RefusedLastWindow);
    }

    #[test]
    fn test_geometry_round_trip() {
        let mut session = Session::new();
        session.add("w1");

        let blob = vec![0x01, 0xff, 0x00, 0x7f];
        session.set_geometry("w1", blob.clone());
        assert_eq!(session.geometry("w1"), blob);

        // Unknown id: empty get, silent set
        assert!(session.geometry("unknown").is_empty());
        session.set_geometry("unknown", vec![1, 2, 3]);
        assert_eq!(session.windows(), vec!["w1"]);
    }

    #[test]
    fn test_open_files_wholesale_replace() {
        let mut session = Session::new();
        session.add("w1");

        let files = vec![
            OpenFile {
                file_name: "a.log".to_string(),
                top_line: 120,
                view_context: "split=60".to_string(),
                timeline_nodes: vec![TimelineNode(serde_json::json!({"line": 5}))],
            },
            OpenFile::new("b.log"),
        ];

        session.set_open_files("w1", files.clone());
        assert_eq!(session.open_files("w1"), files);

        session.set_open_files("w1", Vec::new());
        assert!(session.open_files("w1").is_empty());

        // Unknown id: empty get, silent set
        assert!(session.open_files("unknown").is_empty());
        session.set_open_files("unknown", files);
        assert!(session.open_files("unknown").is_empty());
    }
}
