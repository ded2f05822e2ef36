use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::types::{Affiliate, AffiliateId, AffiliateStatus, ClinicId};

#[derive(Default)]
pub struct AffiliateStore {
    affiliates: DashMap<AffiliateId, Affiliate>,
}

impl AffiliateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, clinic_id: ClinicId, name: &str, status: AffiliateStatus) -> Affiliate {
        let affiliate = Affiliate {
            id: Uuid::new_v4(),
            clinic_id,
            name: name.to_string(),
            status,
            lifetime_conversions: 0,
            created_at: Utc::now(),
        };
        self.affiliates.insert(affiliate.id, affiliate.clone());
        affiliate
    }

    pub fn get(&self, id: AffiliateId) -> Option<Affiliate> {
        self.affiliates.get(&id).map(|a| a.clone())
    }

    pub fn set_status(&self, id: AffiliateId, status: AffiliateStatus) -> ClinicResult<()> {
        let mut entry = self
            .affiliates
            .get_mut(&id)
            .ok_or(ClinicError::AffiliateNotFound(id))?;
        entry.status = status;
        Ok(())
    }

    /// Bump the lifetime-conversions counter. Called inside the patient row
    /// lock, once per non-redundant attribution.
    pub fn increment_conversions(&self, id: AffiliateId) -> ClinicResult<u64> {
        let mut entry = self
            .affiliates
            .get_mut(&id)
            .ok_or(ClinicError::AffiliateNotFound(id))?;
        entry.lifetime_conversions += 1;
        Ok(entry.lifetime_conversions)
    }

    pub fn for_clinic(&self, clinic_id: ClinicId) -> Vec<Affiliate> {
        self.affiliates
            .iter()
            .filter(|e| e.value().clinic_id == clinic_id)
            .map(|e| e.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_conversions() {
        let store = AffiliateStore::new();
        let a = store.create(Uuid::new_v4(), "Wellness Blog", AffiliateStatus::Active);
        assert_eq!(store.increment_conversions(a.id).unwrap(), 1);
        assert_eq!(store.increment_conversions(a.id).unwrap(), 2);
        assert_eq!(store.get(a.id).unwrap().lifetime_conversions, 2);
    }

    #[test]
    fn test_set_status() {
        let store = AffiliateStore::new();
        let a = store.create(Uuid::new_v4(), "Wellness Blog", AffiliateStatus::Active);
        store.set_status(a.id, AffiliateStatus::Terminated).unwrap();
        assert_eq!(store.get(a.id).unwrap().status, AffiliateStatus::Terminated);

        assert!(matches!(
            store.set_status(Uuid::new_v4(), AffiliateStatus::Paused),
            Err(ClinicError::AffiliateNotFound(_))
        ));
    }

    #[test]
    fn test_increment_missing_affiliate() {
        let store = AffiliateStore::new();
        assert!(matches!(
            store.increment_conversions(Uuid::new_v4()),
            Err(ClinicError::AffiliateNotFound(_))
        ));
    }
}
