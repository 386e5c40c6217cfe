//! Terminal summary with colors and box drawing.

use colored::Colorize;

use claimgate_core::VerdictStatus;

use crate::entitlement::ClosureState;
use crate::stability::RobustnessClass;

use super::VerdictArtifact;

/// Format an artifact for human-readable terminal output.
///
/// The JSON artifact is the contract; this summary is for people.
pub fn format_summary(artifact: &VerdictArtifact) -> String {
    let mut output = String::new();

    output.push_str(&format_box_top());
    output.push_str(&format_box_line(&format_status(artifact.verdict.status())));
    output.push_str(&format_box_line(&format!(
        "Reason: {}",
        artifact.verdict.status_reason()
    )));
    output.push_str(&format_box_separator());

    output.push_str(&format_box_line(&format!("Run: {}", artifact.run_id)));
    let profile = artifact
        .profile
        .map(|p| format!(" ({})", p))
        .unwrap_or_default();
    output.push_str(&format_box_line(&format!(
        "Seed: {}  Iterations: {}{}",
        artifact.seed, artifact.iterations, profile
    )));
    output.push_str(&format_box_line(&format!(
        "Groups: {} vs {} observations",
        artifact.cohort.group_a.size, artifact.cohort.group_b.size
    )));

    match &artifact.adequacy {
        Some(a) if a.pass => {
            output.push_str(&format_box_line(&format!("Adequacy: {}", "pass".green())));
        }
        Some(a) => {
            output.push_str(&format_box_line(&format!("Adequacy: {}", "fail".red())));
            for code in &a.failed_thresholds {
                output.push_str(&format_box_line(&format!("  - {}", code)));
            }
        }
        None => {
            output.push_str(&format_box_line(&format!(
                "Adequacy: {}",
                "not evaluated".dimmed()
            )));
        }
    }
    output.push_str(&format_box_separator());

    if let Some(ref effect) = artifact.effect {
        output.push_str(&format_box_line(&"Effect:".bold().to_string()));
        output.push_str(&format_box_line(&format!(
            "  {} = {:.4}",
            effect.statistic_name, effect.value
        )));
        if let Some(ref ranking) = effect.ranking {
            output.push_str(&format_box_line(&format!(
                "  Top: {}  Margin: {:.3}",
                ranking.top_identity, ranking.margin_to_runner_up
            )));
        }
    }

    if let Some(ref r) = artifact.resampling {
        let ci = match (r.ci_lower, r.ci_upper) {
            (Some(lo), Some(hi)) => format!("[{:.4}, {:.4}]", lo, hi),
            _ => "degenerate".yellow().to_string(),
        };
        output.push_str(&format_box_line(&format!(
            "  {:.0}% CI: {}",
            r.confidence_level * 100.0,
            ci
        )));
        output.push_str(&format_box_line(&format!("  p-value: {:.4}", r.p_value)));
        output.push_str(&format_box_line(&format!(
            "  Jackknife: {:.1}% ({} of {} folds)",
            r.jackknife_stability * 100.0,
            r.jackknife.folds_evaluated,
            r.jackknife.folds_total
        )));
    }
    if artifact.effect.is_some() || artifact.resampling.is_some() {
        output.push_str(&format_box_separator());
    }

    let stability = &artifact.stability;
    output.push_str(&format_box_line(&format!(
        "Stability: {}  ({} lanes, agreement {:.0}%)",
        format_robustness(stability.robustness_class),
        stability.lanes.len(),
        stability.agreement_ratio * 100.0
    )));
    for lane in stability.lanes.iter().filter(|l| l.disagrees && !l.publication) {
        output.push_str(&format_box_line(&format!(
            "  {} [{}]: {}",
            lane.lane_id,
            lane.lane_class,
            lane.status.to_string().yellow()
        )));
    }
    output.push_str(&format_box_separator());

    let entitlement = &artifact.entitlement;
    output.push_str(&format_box_line(&format!(
        "Entitlement: {}  (policy {}, rule {})",
        format_lane(entitlement.lane),
        entitlement.policy_version,
        entitlement.rule_id
    )));
    output.push_str(&format_box_bottom());

    output.push_str(&format!("\n{} {}\n", "Allowed:".green().bold(), entitlement.allowed_claim));
    output.push_str(&format!(
        "{} {}\n",
        "Disallowed:".red().bold(),
        entitlement.disallowed_claim
    ));
    if !entitlement.reopen_triggers.is_empty() {
        output.push_str(&format!("{}\n", "Reopen when:".dimmed()));
        for trigger in &entitlement.reopen_triggers {
            output.push_str(&format!("  - {}\n", trigger.dimmed()));
        }
    }

    output
}

fn format_status(status: VerdictStatus) -> String {
    let label = status.as_str();
    match status {
        VerdictStatus::ConclusivePositive | VerdictStatus::ConclusiveNegative => {
            format!("{} {}", "\u{2713}".green().bold(), label.green().bold())
        }
        VerdictStatus::InconclusiveUnderpowered | VerdictStatus::InconclusiveAmbiguity => {
            format!("{} {}", "?".yellow().bold(), label.yellow().bold())
        }
        VerdictStatus::BlockedDataGeometry => {
            format!("{} {}", "\u{2717}".red().bold(), label.red().bold())
        }
    }
}

fn format_robustness(class: RobustnessClass) -> String {
    match class {
        RobustnessClass::Robust => class.as_str().green().to_string(),
        RobustnessClass::Mixed => class.as_str().yellow().to_string(),
        RobustnessClass::Fragile => class.as_str().red().to_string(),
    }
}

fn format_lane(lane: ClosureState) -> String {
    match lane {
        ClosureState::Aligned => lane.as_str().green().bold().to_string(),
        ClosureState::Qualified => lane.as_str().green().to_string(),
        ClosureState::Bounded | ClosureState::Inconclusive => lane.as_str().yellow().to_string(),
        ClosureState::Blocked => lane.as_str().red().bold().to_string(),
    }
}

// Box drawing helpers

const BOX_WIDTH: usize = 64;

fn format_box_top() -> String {
    format!("\u{250C}{}\u{2510}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_bottom() -> String {
    format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_separator() -> String {
    format!("\u{251C}{}\u{2524}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_line(content: &str) -> String {
    let visible_len = strip_ansi_codes(content).chars().count();
    let padding = (BOX_WIDTH - 2).saturating_sub(visible_len);
    format!("\u{2502} {}{} \u{2502}\n", content, " ".repeat(padding))
}

/// Strip ANSI escape codes for length calculation.
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
