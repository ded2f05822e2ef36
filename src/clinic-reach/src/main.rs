//! Clinic Reach — affiliate attribution and commission core for multi-tenant
//! clinic platforms.
//!
//! Entry point that wires the stores and services together and runs an
//! end-to-end attribution simulation: click → intake → commission → report.
//! The attribution core is an in-process service boundary; transport layers
//! embed the crates directly.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use clinic_attribution::AttributionResolver;
use clinic_core::config::AppConfig;
use clinic_core::types::{AffiliateStatus, Patient, TouchType};
use clinic_intake::IntakeAttributionService;
use clinic_ledger::{commission_created, CommissionLedger};
use clinic_reporting::AffiliateReportBuilder;
use clinic_store::{
    AffiliateStore, ClinicStore, NewTouch, PatientStore, RefCodeStore, SettingsStore, TouchStore,
};

#[derive(Parser, Debug)]
#[command(name = "clinic-reach")]
#[command(about = "Affiliate attribution and commission core for clinic platforms")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CLINIC_REACH__NODE_ID")]
    node_id: Option<String>,

    /// Print the demo report as JSON instead of log lines
    #[arg(long, default_value_t = false)]
    json_report: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_reach=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Clinic Reach starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }

    info!(
        node_id = %config.node_id,
        new_patient_model = %config.attribution.new_patient_model,
        returning_patient_model = %config.attribution.returning_patient_model,
        cookie_window_days = config.attribution.cookie_window_days,
        "Configuration loaded"
    );

    // Wire the platform.
    let patients = Arc::new(PatientStore::new());
    let touches = Arc::new(TouchStore::new());
    let ref_codes = Arc::new(RefCodeStore::new());
    let affiliates = Arc::new(AffiliateStore::new());
    let clinics = Arc::new(ClinicStore::new());
    let settings = Arc::new(SettingsStore::new());
    let ledger = Arc::new(CommissionLedger::new());

    let resolver = AttributionResolver::new(
        touches.clone(),
        settings.clone(),
        config.attribution.clone(),
    );
    let intake = IntakeAttributionService::new(
        patients.clone(),
        touches.clone(),
        ref_codes.clone(),
        affiliates.clone(),
        clinics.clone(),
        config.intake.clone(),
    );
    let reports = AffiliateReportBuilder::new(touches.clone(), affiliates.clone(), ledger.clone());

    // Demo flow: a visitor clicks an affiliate link, submits an intake form
    // with the promo code, pays, and shows up in the clinic's report.
    let clinic = clinics.create("Northside Family Clinic");
    let affiliate = affiliates.create(clinic.id, "Wellness Weekly", AffiliateStatus::Active);
    ref_codes.upsert(clinic.id, "SPRING24", affiliate.id, true);

    touches.record(NewTouch {
        clinic_id: clinic.id,
        affiliate_id: Some(affiliate.id),
        ref_code: "SPRING24".into(),
        touch_type: TouchType::Click,
        visitor_fingerprint: Some("fp-demo".into()),
        cookie_id: Some("cookie-demo".into()),
    });

    if let Some(outcome) = resolver.resolve(clinic.id, Some("fp-demo"), Some("cookie-demo"), true) {
        info!(affiliate_id = %outcome.affiliate_id, model = outcome.model.name(),
              confidence = ?outcome.confidence, "Passive resolution");
    }

    let patient_id = patients.insert(Patient::new(clinic.id));
    let result = intake.attribute_from_intake(patient_id, "spring24", clinic.id, "intake_form");
    info!(success = result.success, affiliate_id = ?result.affiliate_id,
          touch_created = result.touch_created, "Intake attribution");

    if result.success {
        if let Some(affiliate_id) = result.affiliate_id {
            let appended = ledger.record(commission_created(
                "evt_demo_payment_001",
                clinic.id,
                affiliate_id,
                patient_id,
                20_000,
                2_000,
            ))?;
            info!(appended, "Commission recorded");
        }
    }

    let rows = reports.clinic_report(clinic.id);
    if cli.json_report {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            info!(affiliate = %row.affiliate_name, clicks = row.clicks,
                  conversions = %row.conversions, commission_cents = %row.commission_cents,
                  "Report row");
        }
    }

    info!("Clinic Reach simulation complete");
    Ok(())
}
