use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use clinic_core::types::{Clinic, ClinicId};

#[derive(Default)]
pub struct ClinicStore {
    clinics: DashMap<ClinicId, Clinic>,
}

impl ClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str) -> Clinic {
        let clinic = Clinic {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.clinics.insert(clinic.id, clinic.clone());
        clinic
    }

    pub fn get(&self, id: ClinicId) -> Option<Clinic> {
        self.clinics.get(&id).map(|c| c.clone())
    }

    /// Clinic name for diagnostics; falls back to the id when the row is gone.
    pub fn display_name(&self, id: ClinicId) -> String {
        self.get(id).map(|c| c.name).unwrap_or_else(|| id.to_string())
    }
}
