use std::collections::{HashMap, HashSet};

use crate::error::KpiDataError;
use crate::models::{
    BackendKpiRecord, KpiCategory, KpiMetric, RawKpiValue, Severity, TargetAchievement,
};

/// Below this share of target a missed KPI is shown as critical.
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;

/// Threshold per KPI name. Names are matched exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTable {
    targets: HashMap<String, f64>,
}

impl TargetTable {
    pub fn new(targets: HashMap<String, f64>) -> Self {
        Self { targets }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.targets.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

impl Default for TargetTable {
    fn default() -> Self {
        let targets = [
            ("Pass Rate", 70.0),
            ("Completion Rate", 80.0),
            ("Average Score", 70.0),
            ("Avg Engagement Rate", 80.0),
            ("Avg Credits", 60.0),
            ("Avg Clicks per Student", 1500.0),
        ]
        .into_iter()
        .map(|(name, target)| (name.to_string(), target))
        .collect();
        Self::new(targets)
    }
}

pub fn normalize(
    records: &[BackendKpiRecord],
    targets: &TargetTable,
) -> Result<Vec<KpiCategory>, KpiDataError> {
    let mut categories: Vec<KpiCategory> = Vec::new();
    let mut bucket_index: HashMap<&str, usize> = HashMap::new();
    let mut seen_ids: HashSet<i64> = HashSet::new();

    for record in records {
        if !seen_ids.insert(record.kpi_id) {
            return Err(KpiDataError::DuplicateId {
                kpi_id: record.kpi_id,
            });
        }

        let metric = KpiMetric {
            id: format!("kpi-{}", record.kpi_id),
            title: record.name.clone(),
            value: coerce_value(record)?,
            unit: record.unit.clone(),
            target: targets.get(&record.name),
            description: record.definition.clone(),
        };

        let index = *bucket_index
            .entry(record.category.as_str())
            .or_insert_with(|| {
                categories.push(KpiCategory {
                    category: record.category.clone(),
                    metrics: Vec::new(),
                });
                categories.len() - 1
            });
        categories[index].metrics.push(metric);
    }

    Ok(categories)
}

fn coerce_value(record: &BackendKpiRecord) -> Result<f64, KpiDataError> {
    let malformed = || KpiDataError::MalformedValue {
        kpi_id: record.kpi_id,
        name: record.name.clone(),
        raw: record.value.to_string(),
    };

    let value = match &record.value {
        RawKpiValue::Number(value) => *value,
        RawKpiValue::Text(text) => text.trim().parse::<f64>().map_err(|_| malformed())?,
        RawKpiValue::Other(_) => return Err(malformed()),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(malformed())
    }
}

pub fn compute_achievement(value: f64, target: Option<f64>) -> Option<TargetAchievement> {
    let target = target.filter(|t| t.is_finite() && *t != 0.0)?;

    Some(TargetAchievement {
        percentage: round1(value / target * 100.0),
        diff: value - target,
        is_achieved: value >= target,
    })
}

pub fn severity(achievement: &TargetAchievement) -> Severity {
    if achievement.is_achieved {
        Severity::Good
    } else if achievement.percentage >= WARNING_THRESHOLD_PERCENT {
        Severity::Warning
    } else {
        Severity::Critical
    }
}

/// Accuracy bands used on the model cards, in percent.
pub fn accuracy_severity(accuracy: f64) -> Severity {
    match accuracy {
        a if a >= 90.0 => Severity::Good,
        a if a >= 80.0 => Severity::Warning,
        _ => Severity::Critical,
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(kpi_id: i64, name: &str, value: RawKpiValue, category: &str) -> BackendKpiRecord {
        BackendKpiRecord {
            kpi_id,
            name: name.to_string(),
            value,
            unit: "%".to_string(),
            category: category.to_string(),
            definition: format!("{name} across all presentations"),
        }
    }

    fn no_targets() -> TargetTable {
        TargetTable::new(HashMap::new())
    }

    fn sample_records() -> Vec<BackendKpiRecord> {
        vec![
            record(1, "Pass Rate", RawKpiValue::Number(68.5), "Student Performance"),
            record(2, "Total VLE Clicks", RawKpiValue::Number(912_340.0), "VLE Engagement"),
            record(3, "Completion Rate", RawKpiValue::Text("76.2".into()), "Student Performance"),
            record(4, "Active Students", RawKpiValue::Number(24_567.0), "VLE Engagement"),
        ]
    }

    #[test]
    fn every_metric_lands_in_exactly_one_category() {
        let records = sample_records();
        let categories = normalize(&records, &TargetTable::default()).unwrap();

        let mut ids: Vec<&str> = categories
            .iter()
            .flat_map(|c| c.metrics.iter().map(|m| m.id.as_str()))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["kpi-1", "kpi-2", "kpi-3", "kpi-4"]);

        for category in &categories {
            let names: Vec<&str> = records
                .iter()
                .filter(|r| r.category == category.category)
                .map(|r| r.name.as_str())
                .collect();
            let titles: Vec<&str> = category.metrics.iter().map(|m| m.title.as_str()).collect();
            assert_eq!(titles, names);
        }
    }

    #[test]
    fn categories_keep_first_seen_order() {
        let records = vec![
            record(1, "a", RawKpiValue::Number(1.0), "B"),
            record(2, "b", RawKpiValue::Number(2.0), "A"),
            record(3, "c", RawKpiValue::Number(3.0), "B"),
        ];
        let categories = normalize(&records, &no_targets()).unwrap();

        let order: Vec<&str> = categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(categories[0].metrics.len(), 2);
        assert_eq!(categories[0].metrics[1].id, "kpi-3");
    }

    #[test]
    fn category_grouping_is_case_sensitive() {
        let records = vec![
            record(1, "a", RawKpiValue::Number(1.0), "Engagement"),
            record(2, "b", RawKpiValue::Number(2.0), "engagement"),
        ];
        let categories = normalize(&records, &no_targets()).unwrap();
        assert_eq!(categories.len(), 2);
    }

    #[test]
    fn metric_fields_follow_the_record() {
        let categories = normalize(&sample_records(), &TargetTable::default()).unwrap();
        let pass_rate = &categories[0].metrics[0];

        assert_eq!(
            pass_rate,
            &KpiMetric {
                id: "kpi-1".to_string(),
                title: "Pass Rate".to_string(),
                value: 68.5,
                unit: "%".to_string(),
                target: Some(70.0),
                description: "Pass Rate across all presentations".to_string(),
            }
        );

        let clicks = &categories[1].metrics[0];
        assert_eq!(clicks.target, None);
    }

    #[test]
    fn quoted_numbers_are_coerced() {
        let records = vec![record(9, "Avg Credits", RawKpiValue::Text(" 79.8 ".into()), "X")];
        let categories = normalize(&records, &no_targets()).unwrap();
        assert_eq!(categories[0].metrics[0].value, 79.8);
    }

    #[test]
    fn malformed_value_fails_the_whole_call() {
        let mut records = sample_records();
        records.push(record(
            5,
            "Avg Credits",
            RawKpiValue::Text("not-a-number".into()),
            "Student Performance",
        ));

        let err = normalize(&records, &TargetTable::default()).unwrap_err();
        assert_eq!(
            err,
            KpiDataError::MalformedValue {
                kpi_id: 5,
                name: "Avg Credits".to_string(),
                raw: "not-a-number".to_string(),
            }
        );
    }

    #[test]
    fn non_finite_and_empty_strings_are_malformed() {
        for raw in ["NaN", "inf", ""] {
            let records = vec![record(1, "x", RawKpiValue::Text(raw.into()), "X")];
            assert!(
                matches!(
                    normalize(&records, &no_targets()),
                    Err(KpiDataError::MalformedValue { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn null_and_boolean_values_are_malformed() {
        let records = vec![
            record(1, "Pass Rate", RawKpiValue::Number(70.0), "A"),
            record(2, "Avg Credits", RawKpiValue::Other(serde_json::Value::Null), "A"),
        ];
        assert_eq!(
            normalize(&records, &no_targets()),
            Err(KpiDataError::MalformedValue {
                kpi_id: 2,
                name: "Avg Credits".to_string(),
                raw: "null".to_string(),
            })
        );

        let records = vec![record(3, "x", RawKpiValue::Other(serde_json::Value::Bool(true)), "A")];
        assert!(matches!(
            normalize(&records, &no_targets()),
            Err(KpiDataError::MalformedValue { kpi_id: 3, .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let records = vec![
            record(1, "a", RawKpiValue::Number(1.0), "A"),
            record(1, "b", RawKpiValue::Number(2.0), "B"),
        ];
        assert_eq!(
            normalize(&records, &no_targets()),
            Err(KpiDataError::DuplicateId { kpi_id: 1 })
        );
    }

    #[test]
    fn empty_input_gives_no_categories() {
        assert!(normalize(&[], &TargetTable::default()).unwrap().is_empty());
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let records = sample_records();
        let targets = TargetTable::default();
        assert_eq!(
            normalize(&records, &targets).unwrap(),
            normalize(&records, &targets).unwrap()
        );
    }

    #[test]
    fn reaching_the_target_exactly_counts_as_achieved() {
        let achievement = compute_achievement(80.0, Some(80.0)).unwrap();
        assert_eq!(achievement.percentage, 100.0);
        assert_eq!(achievement.diff, 0.0);
        assert!(achievement.is_achieved);
    }

    #[test]
    fn just_below_target_is_not_achieved() {
        let achievement = compute_achievement(79.9, Some(80.0)).unwrap();
        assert_eq!(achievement.percentage, 99.9);
        assert!(!achievement.is_achieved);
        assert!((achievement.diff + 0.1).abs() < 1e-9);
    }

    #[test]
    fn missing_zero_or_non_finite_targets_yield_nothing() {
        assert_eq!(compute_achievement(50.0, None), None);
        assert_eq!(compute_achievement(50.0, Some(0.0)), None);
        assert_eq!(compute_achievement(50.0, Some(f64::NAN)), None);
        assert_eq!(compute_achievement(50.0, Some(f64::INFINITY)), None);
    }

    #[test]
    fn severity_bands() {
        let good = compute_achievement(72.0, Some(70.0)).unwrap();
        assert_eq!(severity(&good), Severity::Good);

        let boundary = compute_achievement(64.0, Some(80.0)).unwrap();
        assert_eq!(boundary.percentage, 80.0);
        assert_eq!(severity(&boundary), Severity::Warning);

        let critical = compute_achievement(63.0, Some(80.0)).unwrap();
        assert_eq!(critical.percentage, 78.8);
        assert_eq!(severity(&critical), Severity::Critical);
    }

    #[test]
    fn accuracy_bands_follow_model_cards() {
        assert_eq!(accuracy_severity(91.4), Severity::Good);
        assert_eq!(accuracy_severity(90.0), Severity::Good);
        assert_eq!(accuracy_severity(87.3), Severity::Warning);
        assert_eq!(accuracy_severity(79.9), Severity::Critical);
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(99.875), 99.9);
        assert_eq!(round1(97.857142), 97.9);
        assert_eq!(round1(-0.04), -0.0);
    }
}
