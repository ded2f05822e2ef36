//! Per-affiliate performance rows with uniform suppression: when the
//! conversion count of a row is masked, its revenue and commission are
//! masked with it — a partially suppressed row would leak the cell through
//! correlation.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use clinic_core::types::{AffiliateId, ClinicId};
use clinic_ledger::CommissionLedger;
use clinic_store::{AffiliateStore, TouchStore};

use crate::suppression::{suppress_small_number, MaskedCount};

#[derive(Debug, Clone, Serialize)]
pub struct AffiliatePerformanceRow {
    pub affiliate_id: AffiliateId,
    pub affiliate_name: String,
    pub clicks: u64,
    pub conversions: MaskedCount,
    pub revenue_cents: MaskedCount,
    pub commission_cents: MaskedCount,
}

impl AffiliatePerformanceRow {
    /// Build a row from raw aggregates, applying suppression uniformly.
    /// Clicks are traffic, not patient-linked events, and stay exact.
    pub fn from_raw(
        affiliate_id: AffiliateId,
        affiliate_name: String,
        clicks: u64,
        conversions: u64,
        revenue_cents: u64,
        commission_cents: u64,
    ) -> Self {
        let masked_conversions = suppress_small_number(conversions);
        let (revenue, commission) = if masked_conversions.is_masked() {
            (MaskedCount::masked(), MaskedCount::masked())
        } else {
            (
                MaskedCount::Exact(revenue_cents),
                MaskedCount::Exact(commission_cents),
            )
        };
        Self {
            affiliate_id,
            affiliate_name,
            clicks,
            conversions: masked_conversions,
            revenue_cents: revenue,
            commission_cents: commission,
        }
    }
}

pub struct AffiliateReportBuilder {
    touches: Arc<TouchStore>,
    affiliates: Arc<AffiliateStore>,
    ledger: Arc<CommissionLedger>,
}

impl AffiliateReportBuilder {
    pub fn new(
        touches: Arc<TouchStore>,
        affiliates: Arc<AffiliateStore>,
        ledger: Arc<CommissionLedger>,
    ) -> Self {
        Self {
            touches,
            affiliates,
            ledger,
        }
    }

    /// One suppressed row per affiliate of the clinic, ordered by name.
    pub fn clinic_report(&self, clinic_id: ClinicId) -> Vec<AffiliatePerformanceRow> {
        let mut affiliates = self.affiliates.for_clinic(clinic_id);
        affiliates.sort_by(|a, b| a.name.cmp(&b.name));

        let rows: Vec<AffiliatePerformanceRow> = affiliates
            .into_iter()
            .map(|affiliate| {
                let (clicks, conversions) =
                    self.touches.traffic_for_affiliate(clinic_id, affiliate.id);
                let (revenue_cents, commission_cents) = self.ledger.earned_cents(affiliate.id);
                AffiliatePerformanceRow::from_raw(
                    affiliate.id,
                    affiliate.name,
                    clicks,
                    conversions,
                    revenue_cents,
                    commission_cents,
                )
            })
            .collect();

        info!(clinic_id = %clinic_id, rows = rows.len(), "Affiliate report built");
        rows
    }
}
