//! Natural-language steps that follow the analysis: insights about the
//! report, candidate root causes, issue suggestions, and plan goals.
//!
//! Generation never fails outward. When the service is unreachable the
//! callers get a fallback value and the report stays usable.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::generator::{generate_json, GenerationRequest, RetryPolicy, TextGenerator};
use crate::models::{
    AnalysisData, FinalIssue, GeneratedIssue, HeatmapEntry, Insight, PlanSuggestion, Summary,
};

pub const FALLBACK_INSIGHT_TITLE: &str = "Insight generation failed";

const NO_ROOT_CAUSE: &str =
    "No major challenges were detected automatically. Performance may be high across all areas.";

const MAX_ROOT_CAUSES: usize = 3;

impl Insight {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_INSIGHT_TITLE.to_string(),
            text: "The text-generation service could not be reached. Check the network connection or the API key."
                .to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.title == FALLBACK_INSIGHT_TITLE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightDigest {
    pub summary: Summary,
    pub heatmap: Vec<HeatmapDigest>,
    pub mtss_distribution: TierCounts,
    pub most_common_challenges: Vec<ChallengeDigest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDigest {
    pub field: &'static str,
    pub percentage_of_low_performing_schools: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCounts {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeDigest {
    pub category: &'static str,
    pub challenge: &'static str,
    pub count: usize,
}

impl InsightDigest {
    /// Compact view of the report sent to the generator: top five challenges
    /// across all categories, by count.
    pub fn from_analysis(data: &AnalysisData) -> Self {
        let mut challenges: Vec<ChallengeDigest> = data
            .challenges_analysis
            .iter()
            .flat_map(|category| {
                category.challenges.iter().map(|entry| ChallengeDigest {
                    category: category.label,
                    challenge: entry.text,
                    count: entry.count,
                })
            })
            .collect();
        challenges.sort_by(|a, b| b.count.cmp(&a.count));
        challenges.truncate(5);

        Self {
            summary: data.summary.clone(),
            heatmap: data
                .heatmap_data
                .iter()
                .map(|entry| HeatmapDigest {
                    field: entry.label,
                    percentage_of_low_performing_schools: entry.percentage,
                })
                .collect(),
            mtss_distribution: TierCounts {
                tier1: data.mtss_classification.tier1.len(),
                tier2: data.mtss_classification.tier2.len(),
                tier3: data.mtss_classification.tier3.len(),
            },
            most_common_challenges: challenges,
        }
    }
}

fn string_object(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|name| (name.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({ "type": "OBJECT", "properties": properties, "required": fields })
}

pub fn insights_request(data: &AnalysisData) -> Result<GenerationRequest, serde_json::Error> {
    let digest = serde_json::to_string_pretty(&InsightDigest::from_analysis(data))?;
    let prompt = format!(
        "You are an expert educational supervisor analyzing school performance data.\n\
         Based on the following JSON summary of school data, generate 3-4 key insights.\n\
         Focus on correlations, surprising findings, and actionable recommendations.\n\
         Respond with a JSON array of objects, each with a \"title\" and a \"text\" property.\n\
         The text should be a concise, professional, data-driven paragraph.\n\n\
         Data:\n{digest}"
    );
    Ok(GenerationRequest {
        prompt,
        schema: json!({ "type": "ARRAY", "items": string_object(&["title", "text"]) }),
    })
}

/// Asks the generator for insights about `data`. Any failure, including a
/// malformed response, yields a single fallback entry.
pub async fn generate_insights<G>(generator: &G, policy: &RetryPolicy, data: &AnalysisData) -> Vec<Insight>
where
    G: TextGenerator + ?Sized,
{
    let request = match insights_request(data) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Could not serialize insight digest");
            return vec![Insight::fallback()];
        }
    };

    match generate_json::<_, Vec<Insight>>(generator, &request, policy).await {
        Ok(insights) => {
            info!(count = insights.len(), "Insights generated");
            insights
        }
        Err(err) => {
            warn!(error = %err, "Falling back to placeholder insight");
            vec![Insight::fallback()]
        }
    }
}

/// Candidate root causes for the issue-definition step, at most three.
pub fn root_causes(data: &AnalysisData) -> Vec<String> {
    let mut causes = Vec::new();

    let worst = data
        .heatmap_data
        .iter()
        .fold(None::<&HeatmapEntry>, |worst, entry| match worst {
            Some(current) if current.percentage >= entry.percentage => Some(current),
            _ => Some(entry),
        });
    if let Some(entry) = worst.filter(|entry| entry.percentage > 30) {
        causes.push(format!(
            "Consistently low performance in \"{}\": {}% of schools scored low.",
            entry.label, entry.percentage
        ));
    }

    let tier3 = data.mtss_classification.tier3.len();
    if tier3 > 0 && tier3 as f64 / data.summary.total_schools as f64 > 0.2 {
        causes.push(format!(
            "High concentration ({tier3} schools) in the intensive intervention tier (Tier 3), pointing to a deep systemic challenge."
        ));
    }

    causes.extend(
        data.insights
            .iter()
            .filter(|insight| !insight.is_fallback())
            .map(|insight| insight.text.clone()),
    );

    if causes.is_empty() {
        causes.push(NO_ROOT_CAUSE.to_string());
    }

    causes.truncate(MAX_ROOT_CAUSES);
    causes
}

const ISSUE_FIELDS: [&str; 8] = [
    "title", "action", "subject", "context", "result", "vision", "rationale", "level",
];

pub fn issue_request(root_causes: &[String]) -> GenerationRequest {
    let causes = root_causes
        .iter()
        .map(|cause| format!("- {cause}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "You are an expert in organizational development and educational leadership.\n\
         You are given root causes for a problem in a school system. Reframe them into 3-4\n\
         actionable \"How might we...\" central issues.\n\n\
         Root causes:\n{causes}\n\n\
         Respond with a JSON array of objects with these properties:\n\
         - \"title\": a short thematic name for the issue.\n\
         - \"action\": the verb phrase, what is to be done.\n\
         - \"subject\": the noun phrase, what is acted upon.\n\
         - \"context\": how or where the action happens.\n\
         - \"result\": the desired outcome.\n\
         - \"vision\": a strategic long-term vision statement.\n\
         - \"rationale\": why this issue answers the root causes.\n\
         - \"level\": one of \"individual (staff)\", \"system (organization)\", \
         \"system (resources/content)\", \"strategy (intervention)\"."
    );
    GenerationRequest {
        prompt,
        schema: json!({ "type": "ARRAY", "items": string_object(&ISSUE_FIELDS) }),
    }
}

/// Suggested central issues; empty when generation fails.
pub async fn generate_issue_suggestions<G>(
    generator: &G,
    policy: &RetryPolicy,
    root_causes: &[String],
) -> Vec<GeneratedIssue>
where
    G: TextGenerator + ?Sized,
{
    match generate_json(generator, &issue_request(root_causes), policy).await {
        Ok(issues) => issues,
        Err(err) => {
            warn!(error = %err, "Issue suggestions unavailable");
            Vec::new()
        }
    }
}

/// Binds a chosen issue to the analysis it came from.
pub fn finalize_issue(issue: GeneratedIssue, data: &AnalysisData, root_causes: Vec<String>) -> FinalIssue {
    let original_challenge = data
        .insights
        .iter()
        .find(|insight| !insight.is_fallback())
        .map(|insight| insight.title.clone())
        .unwrap_or_else(|| "General challenge".to_string());

    FinalIssue {
        issue,
        original_challenge,
        root_causes,
    }
}

pub fn plan_request(issue: &FinalIssue) -> GenerationRequest {
    let GeneratedIssue {
        action,
        subject,
        context,
        result,
        vision,
        ..
    } = &issue.issue;
    let prompt = format!(
        "You are an assistant for educational strategy. Given a central issue and a vision,\n\
         generate a main goal and 3 SMART objectives for an intervention plan.\n\n\
         Central issue:\n\"How can we {action} {subject} {context}, in order to {result}?\"\n\n\
         Strategic vision:\n\"{vision}\"\n\n\
         Respond with a JSON object with \"mainGoal\" (a single concise string) and\n\
         \"smartObjectives\" (an array of 3 Specific, Measurable, Achievable, Relevant,\n\
         Time-bound objectives)."
    );
    GenerationRequest {
        prompt,
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "mainGoal": { "type": "STRING" },
                "smartObjectives": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["mainGoal", "smartObjectives"]
        }),
    }
}

/// Main goal and SMART objectives; empty when generation fails.
pub async fn generate_plan_suggestions<G>(
    generator: &G,
    policy: &RetryPolicy,
    issue: &FinalIssue,
) -> PlanSuggestion
where
    G: TextGenerator + ?Sized,
{
    match generate_json(generator, &plan_request(issue), policy).await {
        Ok(plan) => plan,
        Err(err) => {
            warn!(error = %err, "Plan suggestions unavailable");
            PlanSuggestion::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::analysis::analyze;
    use crate::error::GenerationError;
    use crate::ingest::sample_schools;
    use crate::models::SchoolRecord;
    use crate::normalize::Score;
    use crate::taxonomy::{FieldKey, Taxonomy};

    fn instant() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            initial_delay: Duration::ZERO,
        }
    }

    fn sample_analysis() -> AnalysisData {
        analyze(&sample_schools(), Taxonomy::standard())
    }

    fn uniform(id: u32, raw: &str) -> SchoolRecord {
        SchoolRecord {
            id,
            name: format!("School {id}"),
            scores: FieldKey::ALL.iter().map(|k| (*k, Score::parse(raw))).collect(),
            ..Default::default()
        }
    }

    fn sample_issue() -> GeneratedIssue {
        GeneratedIssue {
            title: "Staff capacity".to_string(),
            action: "develop".to_string(),
            subject: "teaching teams".to_string(),
            context: "through peer learning".to_string(),
            result: "improve achievement".to_string(),
            vision: "Every teacher grows every year".to_string(),
            rationale: "Addresses turnover".to_string(),
            level: "individual (staff)".to_string(),
        }
    }

    #[test]
    fn digest_keeps_the_top_five_challenges() {
        let digest = InsightDigest::from_analysis(&sample_analysis());
        assert!(digest.most_common_challenges.len() <= 5);
        let counts: Vec<usize> = digest
            .most_common_challenges
            .iter()
            .map(|c| c.count)
            .collect();
        let mut sorted = counts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(counts, sorted);
        assert_eq!(digest.heatmap.len(), FieldKey::ALL.len());
    }

    #[test]
    fn digest_serializes_contract_names() {
        let value = serde_json::to_value(InsightDigest::from_analysis(&sample_analysis())).unwrap();
        assert!(value["heatmap"][0]["percentageOfLowPerformingSchools"].is_number());
        assert!(value["mtssDistribution"]["tier3"].is_number());
    }

    #[tokio::test]
    async fn insights_come_from_the_generator() {
        let stub = |request: &GenerationRequest| -> Result<String, GenerationError> {
            assert!(request.prompt.contains("totalSchools"));
            Ok(r#"[{"title": "Math gap", "text": "Math is the weakest field."}]"#.to_string())
        };
        let insights = generate_insights(&stub, &instant(), &sample_analysis()).await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Math gap");
    }

    #[tokio::test]
    async fn exhausted_retries_yield_a_single_fallback() {
        let calls = AtomicUsize::new(0);
        let down = |_request: &GenerationRequest| -> Result<String, GenerationError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::EmptyResponse)
        };
        let insights = generate_insights(&down, &instant(), &sample_analysis()).await;
        assert_eq!(insights, vec![Insight::fallback()]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn malformed_insights_fall_back() {
        let stub = |_request: &GenerationRequest| -> Result<String, GenerationError> {
            Ok(r#"{"unexpected": true}"#.to_string())
        };
        let insights = generate_insights(&stub, &instant(), &sample_analysis()).await;
        assert!(insights[0].is_fallback());
    }

    #[test]
    fn root_causes_name_the_worst_field_and_tier3_share() {
        let data = analyze(&[uniform(1, "1"), uniform(2, "5")], Taxonomy::standard());
        let causes = root_causes(&data);
        assert_eq!(causes.len(), 2);
        assert!(causes[0].contains("Pedagogical leadership"));
        assert!(causes[0].contains("50%"));
        assert!(causes[1].contains("1 schools"));
    }

    #[test]
    fn root_causes_skip_fallback_insights_and_cap_at_three() {
        let data = analyze(&[uniform(1, "1"), uniform(2, "5")], Taxonomy::standard()).with_insights(vec![
            Insight::fallback(),
            Insight {
                title: "Climate".to_string(),
                text: "Climate scores trail the region.".to_string(),
            },
            Insight {
                title: "Extra".to_string(),
                text: "Dropped by the cap.".to_string(),
            },
        ]);
        let causes = root_causes(&data);
        assert_eq!(causes.len(), 3);
        assert_eq!(causes[2], "Climate scores trail the region.");
    }

    #[test]
    fn healthy_data_gets_a_placeholder_cause() {
        let data = analyze(&[uniform(1, "5")], Taxonomy::standard());
        assert_eq!(root_causes(&data), vec![NO_ROOT_CAUSE.to_string()]);
    }

    #[tokio::test]
    async fn issue_suggestions_parse_and_fall_back_to_empty() {
        let issue_json = serde_json::to_string(&vec![sample_issue()]).unwrap();
        let stub = move |request: &GenerationRequest| -> Result<String, GenerationError> {
            assert!(request.prompt.contains("- low scores"));
            Ok(issue_json.clone())
        };
        let causes = vec!["low scores".to_string()];
        let issues = generate_issue_suggestions(&stub, &instant(), &causes).await;
        assert_eq!(issues, vec![sample_issue()]);

        let down = |_request: &GenerationRequest| -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        };
        assert!(generate_issue_suggestions(&down, &instant(), &causes)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn plan_suggestions_use_the_issue_statement() {
        let data = sample_analysis();
        let issue = finalize_issue(sample_issue(), &data, vec!["cause".to_string()]);
        assert_eq!(issue.original_challenge, "General challenge");

        let stub = |request: &GenerationRequest| -> Result<String, GenerationError> {
            assert!(request
                .prompt
                .contains("How can we develop teaching teams through peer learning"));
            Ok(r#"{"mainGoal": "Raise math", "smartObjectives": ["a", "b", "c"]}"#.to_string())
        };
        let plan = generate_plan_suggestions(&stub, &instant(), &issue).await;
        assert_eq!(plan.main_goal, "Raise math");
        assert_eq!(plan.smart_objectives.len(), 3);

        let down = |_request: &GenerationRequest| -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        };
        assert_eq!(
            generate_plan_suggestions(&down, &instant(), &issue).await,
            PlanSuggestion::default()
        );
    }
}
