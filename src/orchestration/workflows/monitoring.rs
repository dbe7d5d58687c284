//! Integration monitoring: find recent requests → analyze outcomes.
//!
//! Reports success/failure counts by type and by district, failed request
//! details, the overall success rate and the most problematic type. Finding
//! no requests is a successful, empty report.

use super::query_from_filters;
use crate::constants::{status, steps, workflows};
use crate::models::{Request, WorkflowResult};
use crate::orchestration::request_manager::BatchRequestManager;
use crate::state_machine::{StepRequirement, WorkflowRun};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

const TOTAL_STEPS: usize = 2;
const DEFAULT_DAYS_BACK: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringParams {
    #[serde(default)]
    pub type_names: Option<Vec<String>>,
    #[serde(default)]
    pub district_ids: Vec<i64>,
    /// Look-back window; `None` disables the time filter
    #[serde(default = "default_days_back")]
    pub days_back: Option<i64>,
}

fn default_days_back() -> Option<i64> {
    Some(DEFAULT_DAYS_BACK)
}

impl Default for MonitoringParams {
    fn default() -> Self {
        Self {
            type_names: None,
            district_ids: Vec::new(),
            days_back: default_days_back(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
struct OutcomeCounts {
    success: u64,
    failed: u64,
}

impl OutcomeCounts {
    fn add(&mut self, request: &Request) {
        if request.status == Some(status::SUCCEEDED) {
            self.success += 1;
        } else if request.status == Some(status::FAILED) {
            self.failed += 1;
        }
    }
}

/// Pure analysis of a request set
pub(crate) fn analyze(requests: &[Request]) -> Value {
    let mut overall = OutcomeCounts::default();
    let mut by_type: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
    let mut by_district: BTreeMap<i64, OutcomeCounts> = BTreeMap::new();
    let mut districts_with_failures = BTreeSet::new();
    let mut failed_requests = Vec::new();

    for request in requests {
        overall.add(request);
        by_type
            .entry(request.request_type_name.clone())
            .or_default()
            .add(request);
        by_district.entry(request.district_id).or_default().add(request);

        if request.is_failed() {
            districts_with_failures.insert(request.district_id);
            failed_requests.push(json!({
                "request_id": request.request_id,
                "district_id": request.district_id,
                "type_name": request.request_type_name,
                "request_time": request.request_time,
            }));
        }
    }

    let total = requests.len();
    let success_rate = if total > 0 {
        ((overall.success as f64 / total as f64) * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    // Highest failure count wins; ties go to the first name alphabetically
    let most_problematic_type = by_type
        .iter()
        .filter(|(_, counts)| counts.failed > 0)
        .fold(None::<(&String, u64)>, |best, (name, counts)| match best {
            Some((_, failed)) if failed >= counts.failed => best,
            _ => Some((name, counts.failed)),
        })
        .map(|(name, _)| name.clone());

    let healthy_districts = by_district.values().filter(|c| c.failed == 0).count();

    json!({
        "total_requests": total,
        "success_rate": success_rate,
        "by_status": overall,
        "by_type": by_type,
        "by_district": by_district
            .iter()
            .map(|(district, counts)| (district.to_string(), json!(counts)))
            .collect::<serde_json::Map<String, Value>>(),
        "failed_requests": failed_requests,
        "districts_with_failures": districts_with_failures,
        "summary": {
            "healthy_districts": healthy_districts,
            "districts_with_issues": districts_with_failures.len(),
            "most_problematic_type": most_problematic_type,
        },
    })
}

pub(crate) async fn run(manager: &BatchRequestManager, params: MonitoringParams) -> WorkflowResult {
    let mut run = WorkflowRun::new(workflows::INTEGRATION_MONITORING, TOTAL_STEPS);
    run.start();

    let since = params
        .days_back
        .filter(|days| *days > 0)
        .and_then(Duration::try_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .map(|start| start.naive_utc());
    let query = query_from_filters(
        manager,
        params.type_names.clone(),
        Vec::new(),
        params.district_ids.clone(),
        Some(vec![status::FAILED, status::SUCCEEDED]),
        since,
    );
    run.record("type_names", json!(query.type_names));
    run.record("days_back", json!(params.days_back));

    let Some(requests) = run
        .step(
            steps::FIND_REQUESTS,
            StepRequirement::Required,
            manager.find_requests(&query),
        )
        .await
    else {
        return run.finish("Monitoring failed");
    };
    run.record("requests_found", json!(requests.len()));

    let Some(analysis) = run
        .step(steps::ANALYZE_REQUESTS, StepRequirement::Required, async {
            Ok(analyze(&requests))
        })
        .await
    else {
        return run.finish("Monitoring failed");
    };

    let success_rate = analysis["success_rate"].as_f64().unwrap_or(0.0);
    let message = if requests.is_empty() {
        "No recent requests found for monitoring".to_string()
    } else {
        format!(
            "Monitoring complete: {success_rate:.1}% success rate across {} requests",
            requests.len()
        )
    };
    run.record("analysis", analysis);
    run.finish(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: i64, district: i64, type_name: &str, status: i32) -> Request {
        Request {
            request_id: id,
            district_id: district,
            request_type_id: 1,
            request_type_name: type_name.to_string(),
            imported_file_name: None,
            status: Some(status),
            request_time: None,
        }
    }

    #[test]
    fn test_analysis_counts_and_rates() {
        let requests = vec![
            request(1, 123, "SAT", 5),
            request(2, 123, "PSAT", 4),
            request(3, 456, "SAT", 5),
            request(4, 789, "PSAT", 4),
        ];
        let analysis = analyze(&requests);

        assert_eq!(analysis["total_requests"], 4);
        assert_eq!(analysis["success_rate"], 50.0);
        assert_eq!(analysis["by_type"]["PSAT"]["failed"], 2);
        assert_eq!(analysis["by_district"]["123"]["success"], 1);
        assert_eq!(analysis["summary"]["healthy_districts"], 1);
        assert_eq!(analysis["summary"]["districts_with_issues"], 2);
        assert_eq!(analysis["summary"]["most_problematic_type"], "PSAT");
        assert_eq!(analysis["failed_requests"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_analysis() {
        let analysis = analyze(&[]);
        assert_eq!(analysis["total_requests"], 0);
        assert_eq!(analysis["success_rate"], 0.0);
        assert!(analysis["summary"]["most_problematic_type"].is_null());
    }
}
