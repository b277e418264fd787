use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// UI state restored on the next launch against the same backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub base_url: String,
    pub view: String, // serialized view name
    #[serde(default)]
    pub contest_id: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub histogram_preset: usize,
    #[serde(default)]
    pub zip_metric: String,
    #[serde(default)]
    pub show_testers: bool,
    #[serde(default = "default_sidebar_width")]
    pub sidebar_width: u16,
}

fn default_sidebar_width() -> u16 { 30 }

impl Session {
    pub fn cache_path() -> PathBuf {
        std::env::var_os("IW_DASHBOARD_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("iw-dashboard")
                    .join("session.json")
            })
    }
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::cache_path())
    }
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::cache_path())
    }
    pub fn load_from(path: &Path) -> Option<Self> {
        serde_json::from_str(&std::fs::read_to_string(path).ok()?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let s = Session {
            base_url: "http://localhost:8000/".into(),
            view: "users".into(),
            contest_id: Some("c1".into()),
            order_by: Some("-dw_steps".into()),
            histogram_preset: 2,
            zip_metric: "active".into(),
            show_testers: false,
            sidebar_width: 28,
        };
        s.save_to(&path).unwrap();
        assert_eq!(Session::load_from(&path), Some(s));
    }

    #[test]
    fn old_session_files_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"base_url":"http://x/","view":"home"}"#).unwrap();
        let s = Session::load_from(&path).unwrap();
        assert_eq!(s.sidebar_width, 30);
        assert_eq!(s.contest_id, None);
        assert!(Session::load_from(&dir.path().join("missing.json")).is_none());
    }
}
