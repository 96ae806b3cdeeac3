//! Operator preferences persisted in the shared slot store under their own
//! key, separate from the live match snapshot. Partial or legacy payloads
//! merge with defaults field by field, so a saved file from an older build
//! still loads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};
use crate::models::{
    rules, GameSettings, MatchState, TeamSide, DEFAULT_LOCAL_COLOR, DEFAULT_LOCAL_LOGO,
    DEFAULT_LOCAL_NAME, DEFAULT_VISITOR_COLOR, DEFAULT_VISITOR_LOGO, DEFAULT_VISITOR_NAME,
};
use crate::sync::{SlotStore, SETTINGS_KEY};

fn default_local_name() -> String {
    DEFAULT_LOCAL_NAME.to_string()
}
fn default_visitor_name() -> String {
    DEFAULT_VISITOR_NAME.to_string()
}
fn default_local_logo() -> String {
    DEFAULT_LOCAL_LOGO.to_string()
}
fn default_visitor_logo() -> String {
    DEFAULT_VISITOR_LOGO.to_string()
}
fn default_local_color() -> String {
    DEFAULT_LOCAL_COLOR.to_string()
}
fn default_visitor_color() -> String {
    DEFAULT_VISITOR_COLOR.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamNames {
    #[serde(default = "default_local_name")]
    pub local: String,
    #[serde(default = "default_visitor_name")]
    pub visitor: String,
}

impl Default for TeamNames {
    fn default() -> Self {
        Self { local: default_local_name(), visitor: default_visitor_name() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLogos {
    #[serde(default = "default_local_logo")]
    pub local: String,
    #[serde(default = "default_visitor_logo")]
    pub visitor: String,
}

impl Default for TeamLogos {
    fn default() -> Self {
        Self { local: default_local_logo(), visitor: default_visitor_logo() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamColors {
    #[serde(default = "default_local_color")]
    pub local: String,
    #[serde(default = "default_visitor_color")]
    pub visitor: String,
}

impl Default for TeamColors {
    fn default() -> Self {
        Self { local: default_local_color(), visitor: default_visitor_color() }
    }
}

/// Everything an operator can preconfigure before a match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub team_names: TeamNames,
    #[serde(default)]
    pub team_logos: TeamLogos,
    #[serde(default)]
    pub team_colors: TeamColors,
    #[serde(default)]
    pub game: GameSettings,
    /// Optional league or tournament logo shown by the overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_logo: Option<String>,
}

impl AppSettings {
    pub fn team_name(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::Local => &self.team_names.local,
            TeamSide::Visitor => &self.team_names.visitor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.team_names.local.trim().is_empty() || self.team_names.visitor.trim().is_empty() {
            return Err(InputError::EmptyTeamName);
        }
        self.game.validate()
    }

    /// A fresh match seeded with these preferences.
    pub fn seed_state(&self, start_time: u64) -> MatchState {
        let mut state = MatchState::new(start_time, self.game.clone());
        state.local.name = rules::sanitize_team_name(&self.team_names.local);
        state.local.logo = self.team_logos.local.clone();
        state.local.color = self.team_colors.local.clone();
        state.visitor.name = rules::sanitize_team_name(&self.team_names.visitor);
        state.visitor.logo = self.team_logos.visitor.clone();
        state.visitor.color = self.team_colors.visitor.clone();
        state
    }
}

/// Load/save of [`AppSettings`] against the shared slot. A missing or
/// corrupt record degrades to defaults rather than failing startup.
pub struct SettingsStore {
    slot: Arc<dyn SlotStore>,
}

impl SettingsStore {
    pub fn new(slot: Arc<dyn SlotStore>) -> Self {
        Self { slot }
    }

    pub fn load(&self) -> AppSettings {
        let Some(raw) = self.slot.get(SETTINGS_KEY) else {
            return AppSettings::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("stored settings are unreadable, using defaults: {}", err);
                AppSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;
        let encoded = serde_json::to_string(settings)
            .map_err(|err| InputError::MalformedSettings(err.to_string()))?;
        if let Err(err) = self.slot.set(SETTINGS_KEY, &encoded) {
            log::warn!("failed to persist settings: {}", err);
        }
        Ok(())
    }

    pub fn update_team_name(&self, side: TeamSide, name: &str) -> Result<AppSettings> {
        let sanitized = rules::sanitize_team_name(name);
        if sanitized.is_empty() {
            return Err(InputError::EmptyTeamName);
        }
        let mut settings = self.load();
        match side {
            TeamSide::Local => settings.team_names.local = sanitized,
            TeamSide::Visitor => settings.team_names.visitor = sanitized,
        }
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn update_game_settings(&self, game: GameSettings) -> Result<AppSettings> {
        game.validate()?;
        let mut settings = self.load();
        settings.game = game;
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn reset(&self) -> AppSettings {
        self.slot.remove(SETTINGS_KEY);
        AppSettings::default()
    }

    /// JSON export for backup or transfer to another machine.
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.load()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Import a JSON backup; unknown fields are ignored, missing ones take
    /// defaults.
    pub fn import_json(&self, raw: &str) -> Result<AppSettings> {
        let settings: AppSettings = serde_json::from_str(raw)
            .map_err(|err| InputError::MalformedSettings(err.to_string()))?;
        self.save(&settings)?;
        Ok(settings)
    }
}
