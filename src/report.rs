use std::fmt::Write;

use crate::kpi;
use crate::models::{KpiDashboard, KpiMetric, ModelStatus, ModelSummary, PredictionDataPoint, Severity};
use crate::prediction::PredictionResult;

pub fn format_value(value: f64, unit: &str) -> String {
    let number = if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    };

    match unit {
        "" => number,
        "%" => format!("{number}%"),
        unit => format!("{number} {unit}"),
    }
}

fn metric_line(metric: &KpiMetric) -> String {
    let mut line = format!("{}: {}", metric.title, format_value(metric.value, &metric.unit));

    if let Some(achievement) = kpi::compute_achievement(metric.value, metric.target) {
        let target = metric.target.unwrap_or_default();
        let _ = write!(
            line,
            " (target {}, {:.1}% of target, {:+.1}, {})",
            format_value(target, &metric.unit),
            achievement.percentage,
            achievement.diff,
            kpi::severity(&achievement)
        );
    }

    line
}

fn model_line(model: &ModelSummary) -> String {
    format!(
        "{} ({}): accuracy {:.1}% [{}], MAE {}, RMSE {}, R² {:.3}",
        model.name,
        model.model_type,
        model.metrics.accuracy,
        kpi::accuracy_severity(model.metrics.accuracy),
        format_error_metric(model.metrics.mae),
        format_error_metric(model.metrics.rmse),
        model.metrics.r2_score
    )
}

fn format_error_metric(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.1}K", value / 1000.0)
    } else {
        format!("{value:.2}")
    }
}

pub fn render_kpis(dashboard: &KpiDashboard) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "KPI snapshot ({} metrics, updated {})",
        dashboard.metric_count(),
        dashboard.last_updated.format("%Y-%m-%d %H:%M UTC")
    );

    if dashboard.categories.is_empty() {
        let _ = writeln!(output, "No KPI data returned.");
        return output;
    }

    for category in &dashboard.categories {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", category.category);
        for metric in &category.metrics {
            let _ = writeln!(output, "  - {}", metric_line(metric));
        }
    }

    output
}

pub fn render_models(status: &ModelStatus) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} models, average accuracy {:.2}% (updated {})",
        status.summary.total_models,
        status.summary.average_accuracy,
        status.summary.last_updated.format("%Y-%m-%d %H:%M UTC")
    );

    for model in &status.models {
        let _ = writeln!(output, "  - {}", model_line(model));
    }

    output
}

pub fn render_predictions(model_id: &str, points: &[PredictionDataPoint]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Predictions for {model_id}:");

    if points.is_empty() {
        let _ = writeln!(output, "No predictions available.");
        return output;
    }

    for point in points {
        let actual = point
            .actual
            .map(|a| format!("{a:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let band = point
            .confidence
            .map(|c| format!(" [{:.1}, {:.1}]", c.lower, c.upper))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "  {} predicted {:.1}{} actual {}",
            point.date, point.predicted, band, actual
        );
    }

    output
}

pub fn render_prediction(result: &PredictionResult) -> String {
    let mut output = String::new();
    let marker = if result.is_negative { "!" } else { "✓" };

    let _ = writeln!(
        output,
        "[{marker}] {} prediction: {}",
        result.model_kind, result.display_text
    );
    if let Some(message) = &result.message {
        let _ = writeln!(output, "    {message}");
    }

    output
}

pub fn build_report(dashboard: &KpiDashboard, models: Option<&ModelStatus>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Learning Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} ({} KPIs in {} categories)",
        dashboard.last_updated.format("%Y-%m-%d %H:%M UTC"),
        dashboard.metric_count(),
        dashboard.categories.len()
    );

    if dashboard.categories.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No KPI data returned for this snapshot.");
    }

    for category in &dashboard.categories {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", category.category);
        for metric in &category.metrics {
            let _ = writeln!(output, "- {}", metric_line(metric));
        }
    }

    let attention: Vec<&KpiMetric> = dashboard
        .categories
        .iter()
        .flat_map(|c| c.metrics.iter())
        .filter(|m| {
            kpi::compute_achievement(m.value, m.target)
                .is_some_and(|a| kpi::severity(&a) == Severity::Critical)
        })
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    if attention.is_empty() {
        let _ = writeln!(
            output,
            "No KPI is below {}% of its target.",
            kpi::WARNING_THRESHOLD_PERCENT
        );
    } else {
        for metric in attention {
            let _ = writeln!(output, "- {}", metric_line(metric));
        }
    }

    if let Some(status) = models {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Predictive Models");
        let _ = writeln!(
            output,
            "{} models, average accuracy {:.2}%",
            status.summary.total_models, status.summary.average_accuracy
        );
        for model in &status.models {
            let _ = writeln!(output, "- {}", model_line(model));
            let _ = writeln!(
                output,
                "  - last trained {}{}",
                model.last_trained.format("%Y-%m-%d"),
                model
                    .next_update
                    .map(|n| format!(", next update {}", n.format("%Y-%m-%d")))
                    .unwrap_or_default()
            );
            if !model.features.is_empty() {
                let _ = writeln!(output, "  - features: {}", model.features.join(", "));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiCategory;
    use crate::prediction::{LabelStyle, ModelKind, RawPrediction};
    use chrono::{TimeZone, Utc};

    fn metric(id: &str, title: &str, value: f64, unit: &str, target: Option<f64>) -> KpiMetric {
        KpiMetric {
            id: id.to_string(),
            title: title.to_string(),
            value,
            unit: unit.to_string(),
            target,
            description: String::new(),
        }
    }

    fn dashboard() -> KpiDashboard {
        KpiDashboard {
            categories: vec![
                KpiCategory {
                    category: "Student Performance".to_string(),
                    metrics: vec![
                        metric("kpi-1", "Pass Rate", 68.5, "%", Some(70.0)),
                        metric("kpi-2", "Completion Rate", 60.0, "%", Some(80.0)),
                    ],
                },
                KpiCategory {
                    category: "VLE Engagement".to_string(),
                    metrics: vec![metric("kpi-3", "Active Students", 24567.0, "", None)],
                },
            ],
            last_updated: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn values_are_formatted_with_units() {
        assert_eq!(format_value(24567.0, ""), "24567");
        assert_eq!(format_value(68.5, "%"), "68.5%");
        assert_eq!(format_value(72.3, "pts"), "72.3 pts");
    }

    #[test]
    fn metric_line_shows_target_progress() {
        let line = metric_line(&metric("kpi-1", "Pass Rate", 68.5, "%", Some(70.0)));
        assert_eq!(line, "Pass Rate: 68.5% (target 70%, 97.9% of target, -1.5, warning)");

        let plain = metric_line(&metric("kpi-3", "Active Students", 24567.0, "", None));
        assert_eq!(plain, "Active Students: 24567");
    }

    #[test]
    fn report_lists_categories_in_order_and_flags_critical_kpis() {
        let report = build_report(&dashboard(), None);

        let performance = report.find("## Student Performance").unwrap();
        let engagement = report.find("## VLE Engagement").unwrap();
        assert!(performance < engagement);

        let attention = &report[report.find("## Needs Attention").unwrap()..];
        assert!(attention.contains("Completion Rate: 60%"));
        assert!(!attention.contains("Pass Rate"));
        assert!(!report.contains("## Predictive Models"));
    }

    #[test]
    fn empty_dashboard_says_so() {
        let empty = KpiDashboard {
            categories: Vec::new(),
            last_updated: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
        };
        assert!(render_kpis(&empty).contains("No KPI data returned."));
        assert!(build_report(&empty, None).contains("No KPI is below 80% of its target."));
    }

    #[test]
    fn error_metrics_abbreviate_thousands() {
        assert_eq!(format_error_metric(1520.0), "1.5K");
        assert_eq!(format_error_metric(18.5), "18.50");
    }

    #[test]
    fn negative_predictions_are_marked() {
        let result = PredictionResult::new(
            RawPrediction::Number(1.0),
            ModelKind::Dropout,
            LabelStyle::Full,
            None,
        );
        assert_eq!(
            render_prediction(&result),
            "[!] dropout prediction: Student at Risk of Dropping Out\n"
        );
    }
}
