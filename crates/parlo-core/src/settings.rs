use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Initial camera state carried into room setup when accepting a call.
    #[serde(default = "default_true")]
    pub camera_enabled_on_accept: bool,
    /// Initial microphone state carried into room setup when accepting a call.
    #[serde(default = "default_true")]
    pub mic_enabled_on_accept: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: None,
            camera_enabled_on_accept: true,
            mic_enabled_on_accept: true,
        }
    }
}

pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.settings.lock().unwrap().display_name = name;
        self.save();
    }

    pub fn set_camera_enabled_on_accept(&self, enabled: bool) {
        self.settings.lock().unwrap().camera_enabled_on_accept = enabled;
        self.save();
    }

    pub fn set_mic_enabled_on_accept(&self, enabled: bool) {
        self.settings.lock().unwrap().mic_enabled_on_accept = enabled;
        self.save();
    }

    fn save(&self) {
        let settings = self.settings.lock().unwrap().clone();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&settings) {
            let _ = std::fs::write(&self.file_path, json);
        }
    }

    fn load(path: &PathBuf) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }
}
