//! Display Settings
//!
//! Presentation preferences kept in the key/value store next to the
//! instrument cache. Each setting is its own key so a damaged value only
//! resets that one setting.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Storage key for [`DisplaySettings::color_mode`].
pub const COLOR_MODE_KEY: &str = "color-mode";
/// Storage key for [`DisplaySettings::animation_duration_ms`].
pub const ANIMATION_DURATION_KEY: &str = "animation-duration";
/// Storage key for [`DisplaySettings::show_change_percent`].
pub const SHOW_CHANGE_PERCENT_KEY: &str = "show-change-percent";
/// Storage key for [`DisplaySettings::show_premium_percent`].
pub const SHOW_PREMIUM_PERCENT_KEY: &str = "show-premium-percent";

/// Longest accepted flash animation.
pub const MAX_ANIMATION_DURATION_MS: u64 = 5_000;

/// Which color marks a rising price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Green up, red down.
    #[default]
    GreenUp,
    /// Red up, blue/green down (common on Korean exchanges).
    RedUp,
}

impl ColorMode {
    /// Stored form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GreenUp => "green-up",
            Self::RedUp => "red-up",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "green-up" => Some(Self::GreenUp),
            "red-up" => Some(Self::RedUp),
            _ => None,
        }
    }
}

/// User-facing display preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    /// Up/down color convention.
    pub color_mode: ColorMode,
    /// Price flash animation duration in milliseconds.
    pub animation_duration_ms: u64,
    /// Show 24h change as percent (otherwise absolute).
    pub show_change_percent: bool,
    /// Show the premium column as percent (otherwise KRW difference).
    pub show_premium_percent: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::GreenUp,
            animation_duration_ms: 500,
            show_change_percent: true,
            show_premium_percent: true,
        }
    }
}

impl DisplaySettings {
    /// Build settings from stored string values.
    ///
    /// Missing or invalid values fall back to their defaults individually.
    #[must_use]
    pub fn from_entries(entries: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| entries.get(key).map(|v| v.trim());

        Self {
            color_mode: get(COLOR_MODE_KEY)
                .and_then(ColorMode::parse)
                .unwrap_or(defaults.color_mode),
            animation_duration_ms: get(ANIMATION_DURATION_KEY)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms <= MAX_ANIMATION_DURATION_MS)
                .unwrap_or(defaults.animation_duration_ms),
            show_change_percent: get(SHOW_CHANGE_PERCENT_KEY)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.show_change_percent),
            show_premium_percent: get(SHOW_PREMIUM_PERCENT_KEY)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.show_premium_percent),
        }
    }

    /// Stored string values for every setting.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (COLOR_MODE_KEY, self.color_mode.as_str().to_string()),
            (
                ANIMATION_DURATION_KEY,
                self.animation_duration_ms.to_string(),
            ),
            (
                SHOW_CHANGE_PERCENT_KEY,
                self.show_change_percent.to_string(),
            ),
            (
                SHOW_PREMIUM_PERCENT_KEY,
                self.show_premium_percent.to_string(),
            ),
        ]
    }

    /// Keys read by [`Self::from_entries`].
    #[must_use]
    pub const fn keys() -> [&'static str; 4] {
        [
            COLOR_MODE_KEY,
            ANIMATION_DURATION_KEY,
            SHOW_CHANGE_PERCENT_KEY,
            SHOW_PREMIUM_PERCENT_KEY,
        ]
    }

    /// Reject values outside accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.animation_duration_ms > MAX_ANIMATION_DURATION_MS {
            return Err(format!(
                "animationDurationMs must be at most {MAX_ANIMATION_DURATION_MS}"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_round_trip() {
        let settings = DisplaySettings {
            color_mode: ColorMode::RedUp,
            animation_duration_ms: 1200,
            show_change_percent: false,
            show_premium_percent: true,
        };
        let entries: HashMap<String, String> = settings
            .to_entries()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(DisplaySettings::from_entries(&entries), settings);
    }

    #[test]
    fn invalid_values_fall_back_individually() {
        let entries = HashMap::from([
            (COLOR_MODE_KEY.to_string(), "purple".to_string()),
            (ANIMATION_DURATION_KEY.to_string(), "99999".to_string()),
            (SHOW_CHANGE_PERCENT_KEY.to_string(), "false".to_string()),
        ]);
        let settings = DisplaySettings::from_entries(&entries);
        assert_eq!(settings.color_mode, ColorMode::GreenUp);
        assert_eq!(settings.animation_duration_ms, 500);
        assert!(!settings.show_change_percent);
        assert!(settings.show_premium_percent);
    }

    #[test]
    fn validate_rejects_long_animation() {
        let settings = DisplaySettings {
            animation_duration_ms: MAX_ANIMATION_DURATION_MS + 1,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(DisplaySettings::default().validate().is_ok());
    }
}
