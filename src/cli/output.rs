//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans, apply
//! reports, drift reports, and output values in text or JSON form.

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::graph::Scalar;
use crate::planner::{ApplyPlan, ApplyReport, NodeState, ResourceAction};
use crate::reconciler::{DestroyReport, DriftReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Changes")]
    changes: String,
}

/// Apply result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "State")]
    state: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an apply plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ApplyPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ApplyPlan, detailed: bool) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes required - infrastructure matches the declaration.\n",
                "✓".green()
            );
        }

        let mut output = String::from("\nPlan\n");
        let _ = write!(
            output,
            "   Declaration hash: {}\n\n",
            plan.spec_hash.get(..8).unwrap_or(&plan.spec_hash)
        );

        let rows: Vec<PlanRow> = plan
            .nodes
            .iter()
            .map(|node| PlanRow {
                action: node
                    .action
                    .map_or_else(|| String::from("?"), Self::format_action),
                resource: node.address(),
                changes: node
                    .details
                    .iter()
                    .map(|d| d.field.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();

        let table = Table::new(rows).to_string();
        output.push_str(&table);
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to replace, {} unchanged\n",
            plan.action_count(ResourceAction::Create).to_string().green(),
            plan.action_count(ResourceAction::Update).to_string().yellow(),
            plan.action_count(ResourceAction::Replace).to_string().red(),
            plan.action_count(ResourceAction::NoOp)
        );

        if detailed {
            output.push_str("\nDetailed changes:\n");
            for node in &plan.nodes {
                for detail in &node.details {
                    let _ = writeln!(
                        output,
                        "   {}.{}: {} -> {}",
                        node.address(),
                        detail.field,
                        detail.observed.as_deref().unwrap_or("(absent)"),
                        detail.desired.as_deref().unwrap_or("(absent)"),
                    );
                }
            }
        }

        output
    }

    /// Formats an apply report for display.
    #[must_use]
    pub fn format_report(&self, report: &ApplyReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ReportJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &ApplyReport) -> String {
        let mut output = String::from("\n");

        let rows: Vec<ResultRow> = report
            .results
            .iter()
            .map(|result| ResultRow {
                resource: result.address.clone(),
                action: result
                    .action
                    .map_or_else(|| String::from("-"), |a| a.to_string()),
                state: Self::format_state(result.state),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for result in &report.results {
            if let Some(error) = &result.error {
                let _ = writeln!(output, "   {} {}: {error}", "✗".red(), result.address);
            }
        }

        let status = if report.is_converged() {
            "converged".green().to_string()
        } else if report.is_partial() {
            "partial".yellow().to_string()
        } else {
            "failed".red().to_string()
        };
        let _ = write!(
            output,
            "\nApply {status}: {} applied, {} failed, {} skipped\n",
            report.applied(),
            report.failed(),
            report.skipped()
        );

        output
    }

    /// Formats a drift report.
    #[must_use]
    pub fn format_drift(&self, report: &DriftReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&DriftJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => {
                if report.is_converged() {
                    format!("{} No drift detected - state is converged.\n", "✓".green())
                } else {
                    let mut output = format!("{} Drift detected:\n\n", "⚠".yellow());
                    for entry in &report.entries {
                        let _ = writeln!(
                            output,
                            "   {} {} ({})",
                            Self::format_action(entry.action),
                            entry.address,
                            entry
                                .details
                                .iter()
                                .map(|d| d.field.clone())
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                    }
                    let _ = write!(
                        output,
                        "\n{} resources have drifted (declaration {}).\n",
                        report.entries.len(),
                        report.spec_hash
                    );
                    output
                }
            }
        }
    }

    /// Formats resolved output values.
    #[must_use]
    pub fn format_outputs(&self, outputs: &BTreeMap<String, Scalar>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outputs).unwrap_or_default(),
            OutputFormat::Text => {
                if outputs.is_empty() {
                    return String::from("No outputs declared.\n");
                }
                let mut result = String::from("\nOutputs:\n");
                for (name, value) in outputs {
                    let _ = writeln!(result, "   {name} = {value}");
                }
                result
            }
        }
    }

    /// Formats a destroy report.
    #[must_use]
    pub fn format_destroy(&self, report: &DestroyReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&DestroyJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for address in &report.deleted {
                    let _ = writeln!(output, "   {} destroyed {address}", "-".red());
                }
                for address in &report.missing {
                    let _ = writeln!(output, "   {address} was already absent");
                }
                let _ = write!(
                    output,
                    "\nDestroy complete: {} destroyed, {} already absent.\n",
                    report.deleted.len(),
                    report.missing.len()
                );
                output
            }
        }
    }

    /// Formats an action with color.
    fn format_action(action: ResourceAction) -> String {
        match action {
            ResourceAction::Create => "+create".green().to_string(),
            ResourceAction::Update => "~update".yellow().to_string(),
            ResourceAction::Replace => "-/+replace".red().to_string(),
            ResourceAction::NoOp => "noop".dimmed().to_string(),
        }
    }

    /// Formats a node state with color.
    fn format_state(state: NodeState) -> String {
        match state {
            NodeState::Applied => "applied".green().to_string(),
            NodeState::Failed => "failed".red().to_string(),
            NodeState::Skipped => "skipped".yellow().to_string(),
            NodeState::Pending | NodeState::Applying => state.to_string().dimmed().to_string(),
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    spec_hash: String,
    creates: usize,
    updates: usize,
    replaces: usize,
    unchanged: usize,
    resources: Vec<PlanNodeJson>,
}

#[derive(serde::Serialize)]
struct PlanNodeJson {
    address: String,
    action: Option<String>,
    changes: Vec<DetailJson>,
}

#[derive(serde::Serialize)]
struct DetailJson {
    field: String,
    observed: Option<String>,
    desired: Option<String>,
    forces_replacement: bool,
}

impl From<&ApplyPlan> for PlanJson {
    fn from(plan: &ApplyPlan) -> Self {
        Self {
            spec_hash: plan.spec_hash.clone(),
            creates: plan.action_count(ResourceAction::Create),
            updates: plan.action_count(ResourceAction::Update),
            replaces: plan.action_count(ResourceAction::Replace),
            unchanged: plan.action_count(ResourceAction::NoOp),
            resources: plan
                .nodes
                .iter()
                .map(|node| PlanNodeJson {
                    address: node.address(),
                    action: node.action.map(|a| a.to_string()),
                    changes: node
                        .details
                        .iter()
                        .map(|d| DetailJson {
                            field: d.field.clone(),
                            observed: d.observed.clone(),
                            desired: d.desired.clone(),
                            forces_replacement: d.forces_replacement,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ReportJson {
    run_id: String,
    applied: usize,
    failed: usize,
    skipped: usize,
    converged: bool,
    results: Vec<ResultJson>,
}

#[derive(serde::Serialize)]
struct ResultJson {
    address: String,
    action: Option<String>,
    state: String,
    error: Option<String>,
}

impl From<&ApplyReport> for ReportJson {
    fn from(report: &ApplyReport) -> Self {
        Self {
            run_id: report.run_id.to_string(),
            applied: report.applied(),
            failed: report.failed(),
            skipped: report.skipped(),
            converged: report.is_converged(),
            results: report
                .results
                .iter()
                .map(|r| ResultJson {
                    address: r.address.clone(),
                    action: r.action.map(|a| a.to_string()),
                    state: r.state.to_string(),
                    error: r.error.clone(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct DriftJson {
    converged: bool,
    spec_hash: String,
    drifted: Vec<PlanNodeJson>,
}

impl From<&DriftReport> for DriftJson {
    fn from(report: &DriftReport) -> Self {
        Self {
            converged: report.is_converged(),
            spec_hash: report.spec_hash.clone(),
            drifted: report
                .entries
                .iter()
                .map(|entry| PlanNodeJson {
                    address: entry.address.clone(),
                    action: Some(entry.action.to_string()),
                    changes: entry
                        .details
                        .iter()
                        .map(|d| DetailJson {
                            field: d.field.clone(),
                            observed: d.observed.clone(),
                            desired: d.desired.clone(),
                            forces_replacement: d.forces_replacement,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct DestroyJson {
    deleted: Vec<String>,
    missing: Vec<String>,
}

impl From<&DestroyReport> for DestroyJson {
    fn from(report: &DestroyReport) -> Self {
        Self {
            deleted: report.deleted.clone(),
            missing: report.missing.clone(),
        }
    }
}
