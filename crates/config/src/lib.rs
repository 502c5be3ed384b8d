//! Configuration module for the planning backend.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Work-calendar policy (spec §4.1, §6 "single configuration record").
///
/// Minutes are measured from local midnight. Defaults match spec.md:
/// 07:00 morning start, lunch `[11:00, 11:30)`, 15:30 afternoon end,
/// 480 regular minutes/day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkCalendarConfig {
    pub morning_start_minutes: u32,
    pub lunch_start_minutes: u32,
    pub lunch_end_minutes: u32,
    pub afternoon_end_minutes: u32,
    /// How far past `afternoon_end_minutes` the overtime window may extend
    /// at most; a scenario's own `overtime_limit_hours_per_day` is clamped
    /// to this cap.
    pub overtime_window_end_minutes: u32,
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        Self {
            morning_start_minutes: 7 * 60,
            lunch_start_minutes: 11 * 60,
            lunch_end_minutes: 11 * 60 + 30,
            afternoon_end_minutes: 15 * 60 + 30,
            overtime_window_end_minutes: 19 * 60 + 30,
        }
    }
}

impl WorkCalendarConfig {
    pub fn regular_minutes_per_day(&self) -> u32 {
        (self.afternoon_end_minutes - self.morning_start_minutes)
            - (self.lunch_end_minutes - self.lunch_start_minutes)
    }
}

/// Efficiency-to-proficiency-level cut points (spec §4.9).
///
/// `band_5_min` is the lowest average efficiency percentage that maps to
/// level 5, and so on down to level 2; anything below `band_2_min` maps to
/// level 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProficiencyBandsConfig {
    pub band_5_min: f64,
    pub band_4_min: f64,
    pub band_3_min: f64,
    pub band_2_min: f64,
}

impl Default for ProficiencyBandsConfig {
    fn default() -> Self {
        Self {
            band_5_min: 130.0,
            band_4_min: 115.0,
            band_3_min: 85.0,
            band_2_min: 70.0,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Address to bind the server to.
    pub bind_address: String,
    /// Base URL for API (used in generated links).
    pub base_url: String,
    pub calendar: WorkCalendarConfig,
    pub proficiency_bands: ProficiencyBandsConfig,
    /// Holiday dates skipped by `next_workday`, in addition to weekends.
    pub holidays: BTreeSet<NaiveDate>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            bind_address: env_var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            base_url: env_var_or("BASE_URL", "http://localhost:8080"),
            calendar: WorkCalendarConfig::default(),
            proficiency_bands: ProficiencyBandsConfig::default(),
            holidays: parse_holidays(&env_var_or("PLANNING_HOLIDAYS", ""))?,
        })
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse a comma-separated list of `YYYY-MM-DD` dates.
fn parse_holidays(raw: &str) -> Result<BTreeSet<NaiveDate>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ConfigError::InvalidValue("PLANNING_HOLIDAYS".to_string(), s.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_uses_default() {
        let val = env_var_or("NON_EXISTENT_VAR_12345", "default_value");
        assert_eq!(val, "default_value");
    }

    #[test]
    fn default_calendar_has_480_regular_minutes() {
        let cal = WorkCalendarConfig::default();
        assert_eq!(cal.regular_minutes_per_day(), 480);
    }

    #[test]
    fn parse_holidays_accepts_empty_string() {
        assert!(parse_holidays("").unwrap().is_empty());
    }

    #[test]
    fn parse_holidays_parses_multiple_dates() {
        let holidays = parse_holidays("2026-01-01, 2026-12-25").unwrap();
        assert_eq!(holidays.len(), 2);
        assert!(holidays.contains(&NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn parse_holidays_rejects_malformed_date() {
        assert!(parse_holidays("not-a-date").is_err());
    }
}
