use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CLINIC_REACH__` and TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub attribution: AttributionDefaultsConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
}

// ─── Attribution Defaults ───────────────────────────────────────────────

/// System-wide attribution defaults, applied when a clinic has not
/// configured its own settings. Model names are strings so admins can set
/// them via environment; unknown names resolve to last-click downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributionDefaultsConfig {
    #[serde(default = "default_new_patient_model")]
    pub new_patient_model: String,
    #[serde(default = "default_returning_patient_model")]
    pub returning_patient_model: String,
    #[serde(default = "default_cookie_window_days")]
    pub cookie_window_days: u32,
    #[serde(default = "default_impression_window_hours")]
    pub impression_window_hours: u32,
    #[serde(default = "default_enable_fingerprinting")]
    pub enable_fingerprinting: bool,
}

fn default_new_patient_model() -> String {
    "first_click".to_string()
}
fn default_returning_patient_model() -> String {
    "last_click".to_string()
}
fn default_cookie_window_days() -> u32 {
    30
}
fn default_impression_window_hours() -> u32 {
    24
}
fn default_enable_fingerprinting() -> bool {
    true
}

impl Default for AttributionDefaultsConfig {
    fn default() -> Self {
        Self {
            new_patient_model: default_new_patient_model(),
            returning_patient_model: default_returning_patient_model(),
            cookie_window_days: default_cookie_window_days(),
            impression_window_hours: default_impression_window_hours(),
            enable_fingerprinting: default_enable_fingerprinting(),
        }
    }
}

// ─── Intake Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    /// Bound on waiting for the patient row lock. Contending webhook
    /// deliveries serialize on that lock, so this is generous.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    /// Window for the recent-touch fallback heuristic. Strict on purpose:
    /// a stale click is worse than no attribution.
    #[serde(default = "default_recent_click_window_hours")]
    pub recent_click_window_hours: u32,
}

fn default_lock_timeout_secs() -> u64 {
    15
}
fn default_recent_click_window_hours() -> u32 {
    2
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
            recent_click_window_hours: default_recent_click_window_hours(),
        }
    }
}

fn default_node_id() -> String {
    format!("clinic-reach-{}", uuid_suffix())
}

fn uuid_suffix() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            attribution: AttributionDefaultsConfig::default(),
            intake: IntakeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CLINIC_REACH")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.attribution.new_patient_model, "first_click");
        assert_eq!(cfg.attribution.returning_patient_model, "last_click");
        assert_eq!(cfg.attribution.cookie_window_days, 30);
        assert_eq!(cfg.intake.lock_timeout_secs, 15);
        assert_eq!(cfg.intake.recent_click_window_hours, 2);
    }
}
