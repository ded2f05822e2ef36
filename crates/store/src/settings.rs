use dashmap::DashMap;

use clinic_core::types::{ClinicAttributionSettings, ClinicId};

/// Per-clinic attribution settings as entered by clinic admins. Sparse on
/// purpose; resolution into a fully-populated config lives in
/// `clinic-attribution::config`.
#[derive(Default)]
pub struct SettingsStore {
    settings: DashMap<ClinicId, ClinicAttributionSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, clinic_id: ClinicId, settings: ClinicAttributionSettings) {
        self.settings.insert(clinic_id, settings);
    }

    pub fn get(&self, clinic_id: ClinicId) -> Option<ClinicAttributionSettings> {
        self.settings.get(&clinic_id).map(|s| s.clone())
    }
}
