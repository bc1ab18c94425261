use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PROMPTS: [&str; 3] = [
    "you are intelligent and be concise in 100 words",
    "you are creative  and be concise in 100 words",
    "you are practical and and be concise in 100 words",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    #[serde(rename = "Model 1")]
    Model1,
    #[serde(rename = "Model 2")]
    Model2,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tools {
    pub web_search: bool,
    pub notepad: bool,
}

impl Default for Tools {
    fn default() -> Self {
        Self { web_search: true, notepad: true }
    }
}

/// Generation parameters sent along with every submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub num_agents: u32,
    pub prompts: Vec<String>,
    pub duration: String,
    pub model: Model,
    pub temperature: f32,
    pub tools: Tools,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_agents: DEFAULT_PROMPTS.len() as u32,
            prompts: DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
            duration: "2".into(),
            model: Model::Model1,
            temperature: 1.0,
            tools: Tools::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("at least one agent is required")]
    NoAgents,
    #[error("expected {expected} prompts, got {actual}")]
    PromptCount { expected: u32, actual: usize },
    #[error("temperature {0} outside [0, 2]")]
    Temperature(f32),
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.num_agents < 1 {
            return Err(SettingsError::NoAgents);
        }
        if self.prompts.len() != self.num_agents as usize {
            return Err(SettingsError::PromptCount { expected: self.num_agents, actual: self.prompts.len() });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SettingsError::Temperature(self.temperature));
        }
        Ok(())
    }

    /// Reads and validates a settings file written in the camelCase JSON layout.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Current settings plus whether the settings panel is shown.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    visible: bool,
    settings: Settings,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self { visible: false, settings }
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn is_visible(&self) -> bool { self.visible }

    pub fn toggle_visibility(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    /// Replaces the whole record; nothing from the previous one survives.
    pub fn save(&mut self, settings: Settings) {
        self.settings = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_replaces_instead_of_merging() {
        let mut store = SettingsStore::default();
        store.save(Settings {
            num_agents: 3,
            prompts: vec!["a".into(), "b".into(), "c".into()],
            duration: "5".into(),
            model: Model::Model2,
            temperature: 0.3,
            tools: Tools { web_search: false, notepad: true },
        });
        let single = Settings {
            num_agents: 1,
            prompts: vec!["only".into()],
            duration: String::new(),
            model: Model::Model1,
            temperature: 1.5,
            tools: Tools { web_search: true, notepad: false },
        };
        store.save(single.clone());
        assert_eq!(store.settings(), &single);
        assert_eq!(store.settings().prompts.len(), 1);
    }

    #[test]
    fn toggle_flips_visibility() {
        let mut store = SettingsStore::default();
        assert!(!store.is_visible());
        assert!(store.toggle_visibility());
        assert!(!store.toggle_visibility());
    }

    #[test]
    fn defaults_are_consistent() {
        let s = Settings::default();
        assert_eq!(s.validate(), Ok(()));
        assert_eq!(s.prompts[1], DEFAULT_PROMPTS[1]);
    }

    #[test]
    fn validate_rejects_widget_violations() {
        let mut s = Settings::default();
        s.num_agents = 0;
        s.prompts.clear();
        assert_eq!(s.validate(), Err(SettingsError::NoAgents));

        let mut s = Settings::default();
        s.num_agents = 2;
        assert_eq!(s.validate(), Err(SettingsError::PromptCount { expected: 2, actual: 3 }));

        let mut s = Settings::default();
        s.temperature = 2.5;
        assert_eq!(s.validate(), Err(SettingsError::Temperature(2.5)));
    }

    #[test]
    fn reads_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"numAgents":1,"prompts":["be brief"],"duration":"2","model":"Model 2","temperature":0.5,"tools":{"webSearch":false,"notepad":true}}"#,
        )
        .unwrap();
        let s = Settings::from_json_file(&path).unwrap();
        assert_eq!(s.model, Model::Model2);
        assert_eq!(s.prompts, vec!["be brief".to_string()]);
        assert!(!s.tools.web_search);

        std::fs::write(&path, r#"{"numAgents":2,"prompts":["x"],"duration":"","model":"Model 1","temperature":1,"tools":{"webSearch":true,"notepad":true}}"#).unwrap();
        assert!(Settings::from_json_file(&path).is_err());
    }
}
