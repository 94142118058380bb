//! Quality review gate

use super::{GateBuilder, GateResult, IssueKind};
use crate::core::course::{QaReport, Severity};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// Largest tolerated gap between a component score and the overall score
const MAX_COMPONENT_DIVERGENCE: f64 = 2.0;

fn in_range(score: f64) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}

/// Validate a QA report for internal consistency
pub fn validate_qa(report: &QaReport) -> GateResult {
    let mut gate = GateBuilder::new();

    if !in_range(report.overall_score) {
        gate.issue(
            IssueKind::ScoreOutOfRange,
            format!(
                "Overall score {} is outside {}-{}",
                report.overall_score, MIN_SCORE, MAX_SCORE
            ),
        );
    }
    for (name, score) in report.component_scores.named() {
        if !in_range(score) {
            gate.issue(
                IssueKind::ScoreOutOfRange,
                format!("Component score {} = {} is out of range", name, score),
            );
        }
    }

    if report.approved && report.has_critical() {
        gate.issue(
            IssueKind::ApprovalContradiction,
            "Report is approved despite a critical finding",
        );
    }

    let serious = report
        .issues
        .iter()
        .filter(|i| i.severity >= Severity::High)
        .count();
    if report.overall_score >= 8.0 && serious > 0 {
        gate.warn(format!(
            "Score {:.1} is high for a report with {} high/critical finding(s)",
            report.overall_score, serious
        ));
    } else if report.overall_score < 5.0 && report.issues.is_empty() {
        gate.warn(format!(
            "Score {:.1} is low but no findings were reported",
            report.overall_score
        ));
    }

    // All-zero components mean the reviewer did not break the score down.
    let components = report.component_scores.named();
    if components.iter().any(|(_, s)| *s != 0.0) {
        for (name, score) in components {
            if (score - report.overall_score).abs() > MAX_COMPONENT_DIVERGENCE {
                gate.warn(format!(
                    "Component {} ({:.1}) diverges from overall score ({:.1})",
                    name, score, report.overall_score
                ));
            }
        }
    }

    gate.finish()
}
