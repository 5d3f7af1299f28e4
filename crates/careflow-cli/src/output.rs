use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use careflow_core::{Appointment, ClinicalAlert, ResourceReferral};
use careflow_workflow::{DomainEvent, EventOutcome, EventStatus, RuleDefinition, SweepReport};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_failure(msg: &str) {
    println!("{} {}", "✗".red(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_heading(title: &str) {
    println!("\n{}", title.cyan().bold());
}

fn print_table(builder: Builder, rows: usize, empty: &str) {
    if rows == 0 {
        println!("{empty}");
        return;
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

fn status_cell(status: EventStatus) -> String {
    match status {
        EventStatus::Processed => status.as_str().green().to_string(),
        EventStatus::Failed => status.as_str().red().to_string(),
        EventStatus::Pending | EventStatus::Processing => status.as_str().yellow().to_string(),
    }
}

pub fn print_events(events: &[DomainEvent]) {
    let mut builder = Builder::default();
    builder.push_record(["ID", "EventType", "Status", "Attempts", "Error"]);
    for event in events {
        builder.push_record([
            event.id.clone(),
            event.event_type.clone(),
            status_cell(event.status),
            event.attempts.to_string(),
            event.error_message.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    print_table(builder, events.len(), "No events.");
}

pub fn print_rule_definitions(rules: &[RuleDefinition]) {
    let mut builder = Builder::default();
    builder.push_record(["Priority", "Name", "EventType", "Action", "Active"]);
    for rule in rules {
        builder.push_record([
            rule.priority.to_string(),
            rule.name.clone(),
            rule.event_type.clone(),
            rule.action_type.clone(),
            rule.active.to_string(),
        ]);
    }
    print_table(builder, rules.len(), "No rules.");
}

pub fn print_alerts(alerts: &[ClinicalAlert]) {
    let mut builder = Builder::default();
    builder.push_record(["Patient", "Severity", "Title", "Message"]);
    for alert in alerts {
        builder.push_record([
            alert.patient_id.clone(),
            alert.severity.to_string(),
            alert.title.clone(),
            alert.message.clone(),
        ]);
    }
    print_table(builder, alerts.len(), "No alerts.");
}

pub fn print_appointments(appointments: &[Appointment]) {
    let mut builder = Builder::default();
    builder.push_record(["Patient", "Clinician", "ScheduledAt", "Reason"]);
    for appointment in appointments {
        builder.push_record([
            appointment.patient_id.clone(),
            appointment.clinician_name.clone(),
            appointment.scheduled_at.to_string(),
            appointment.reason.clone(),
        ]);
    }
    print_table(builder, appointments.len(), "No appointments.");
}

pub fn print_referrals(referrals: &[ResourceReferral]) {
    let mut builder = Builder::default();
    builder.push_record(["Patient", "Resource", "Status", "Reason"]);
    for referral in referrals {
        builder.push_record([
            referral.patient_id.clone(),
            referral.resource_id.clone(),
            referral.status.to_string(),
            referral.reason.clone(),
        ]);
    }
    print_table(builder, referrals.len(), "No referrals.");
}

pub fn print_sweep_report(report: &SweepReport) {
    let mut builder = Builder::default();
    builder.push_record(["Event", "EventType", "Outcome", "Attempts", "Fired", "Error"]);
    for result in &report.results {
        let outcome = match result.outcome {
            EventOutcome::Processed => "processed".green().to_string(),
            EventOutcome::Failed => "failed".red().to_string(),
            EventOutcome::Skipped => "skipped".yellow().to_string(),
        };
        builder.push_record([
            result.event_id.clone(),
            result.event_type.clone(),
            outcome,
            result.attempts.to_string(),
            result.fired_rules.join(", "),
            result.error_message.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    print_table(builder, report.results.len(), "No candidates.");
    println!(
        "Processed: {}  Failed: {}  Skipped: {}  Expired claims: {}",
        report.processed_count.to_string().green(),
        report.failed_count.to_string().red(),
        report.skipped_count.to_string().yellow(),
        report.expired_claims
    );
}
