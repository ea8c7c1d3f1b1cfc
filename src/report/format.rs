//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays free of presentation concerns
//! - output changes are localized

use crate::batch::{BatchFailure, BatchResults};
use crate::domain::{DetectorConfig, FitConfig};
use crate::error::FitError;
use crate::io::ResultRecord;
use crate::math::{nan_mean, nan_std};

/// Header for a `fit` run: configuration and what was loaded.
pub fn format_run_summary(config: &FitConfig, detector: &DetectorConfig, entries: usize, spectra: usize) -> String {
    let mut out = String::new();

    out.push_str("=== spectemp - spectral temperature fit ===\n");
    out.push_str(&format!(
        "Window: [{:.1}, {:.1}] nm | delta={} | background={}\n",
        config.lower_bound, config.upper_bound, config.delta, config.use_background
    ));
    out.push_str(&format!("Saturation ceiling: {}\n", detector.saturation_ceiling));
    out.push_str(&format!("Loaded: {entries} entries, {spectra} spectra\n\n"));

    out
}

/// One line per measurement, in the given order.
pub fn format_results(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>10} {:>10} {:>10} {:>9} {:>11} {:<4} {:<6}\n",
            "name", "T_planck", "T_wien", "T_ratio", "sd_ratio", "background", "sat", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<10} {:-<10} {:-<10} {:-<9} {:-<11} {:-<4} {:-<6}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in records {
        out.push_str(
            format!(
                "{:<20} {:>10} {:>10} {:>10} {:>9} {:>11} {:<4} {:<6}\n",
                truncate(&r.name, 20),
                fmt_kelvin(r.nonlinear_temperature),
                fmt_kelvin(r.linear_temperature),
                fmt_kelvin(r.ratio_temperature_mean),
                fmt_kelvin(r.ratio_temperature_stddev),
                fmt_sci(r.background),
                if r.saturated { "yes" } else { "no" },
                if r.fitted { "ok" } else { "FAILED" },
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Errors caught while evaluating individual measurements.
pub fn format_failures(failures: &[(String, FitError)]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = format!("\n{} measurement(s) failed:\n", failures.len());
    for (name, err) in failures {
        out.push_str(&format!("- {name}: {err}\n"));
    }
    out
}

/// Trend over a batch: spread of each estimator across members.
pub fn format_batch_summary(results: &BatchResults, failures: &[BatchFailure]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nBatch: n={} (fitted {})\n",
        results.len(),
        results.len() - failures.len()
    ));
    out.push_str(&format!(
        "- planck : mean={} sd={}\n",
        fmt_kelvin(nan_mean(&results.nonlinear_temperatures)),
        fmt_kelvin(nan_std(&results.nonlinear_temperatures)),
    ));
    out.push_str(&format!(
        "- wien   : mean={} sd={}\n",
        fmt_kelvin(nan_mean(&results.linear_temperatures)),
        fmt_kelvin(nan_std(&results.linear_temperatures)),
    ));
    out.push_str(&format!(
        "- ratio sd: mean={}\n",
        fmt_kelvin(nan_mean(&results.ratio_std_devs))
    ));
    out
}

/// `(delta, sd)` pairs, with the smallest spread marked.
pub fn format_delta_scan(name: &str, scan: &[(usize, f64)]) -> String {
    let mut out = format!("Delta scan for {name}:\n");
    if scan.is_empty() {
        out.push_str("(window too small for any delta)\n");
        return out;
    }

    let best = scan
        .iter()
        .filter(|(_, sd)| sd.is_finite())
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(d, _)| *d);

    out.push_str(&format!("{:>6} {:>10}\n", "delta", "sd_ratio"));
    out.push_str(&format!("{:->6} {:->10}\n", "", ""));
    for &(delta, sd) in scan {
        let mark = if Some(delta) == best { " *" } else { "" };
        out.push_str(&format!("{delta:>6} {:>10}{mark}\n", fmt_kelvin(sd)));
    }
    out
}

fn fmt_kelvin(v: f64) -> String {
    if v.is_finite() { format!("{v:.1}") } else { "-".to_string() }
}

fn fmt_sci(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else if v.is_finite() {
        format!("{v:.3e}")
    } else {
        "-".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, t: f64, fitted: bool) -> ResultRecord {
        ResultRecord {
            name: name.to_string(),
            time: None,
            fitted,
            nonlinear_temperature: t,
            linear_temperature: t,
            ratio_temperature_mean: t,
            ratio_temperature_stddev: 3.0,
            nonlinear_multiplier: 1e-6,
            linear_multiplier: 1e-6,
            background: 0.0,
            lower_bound: Some(550.0),
            upper_bound: Some(900.0),
            delta: Some(100),
            use_background: Some(false),
            saturated: false,
        }
    }

    #[test]
    fn results_table_has_header_rule_and_rows() {
        let text = format_results(&[record("a", 2500.0, true), record("b", f64::NAN, false)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("name"));
        assert!(lines[2].contains("2500.0") && lines[2].ends_with("ok"));
        assert!(lines[3].contains(" - ") && lines[3].ends_with("FAILED"));
    }

    #[test]
    fn delta_scan_marks_smallest_spread() {
        let text = format_delta_scan("m", &[(1, 9.0), (2, 1.5), (3, f64::NAN)]);
        assert!(text.lines().any(|l| l.trim_start().starts_with("2 ") && l.ends_with('*')));
        assert_eq!(text.matches('*').count(), 1);
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
