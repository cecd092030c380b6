use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::normalize::{parse_student_count, Score};
use crate::taxonomy::{FieldKey, MainCategory};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub principal: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub students: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "known_scores")]
    pub scores: BTreeMap<FieldKey, Score>,
    #[serde(default, deserialize_with = "known_challenges")]
    pub challenges: BTreeMap<FieldKey, BTreeSet<usize>>,
}

impl SchoolRecord {
    pub fn score(&self, field: FieldKey) -> Score {
        self.scores.get(&field).copied().unwrap_or_default()
    }

    pub fn selected_challenges(&self, field: FieldKey) -> impl Iterator<Item = usize> + '_ {
        self.challenges
            .get(&field)
            .into_iter()
            .flat_map(|selected| selected.iter().copied())
    }

    pub fn student_count(&self) -> i64 {
        parse_student_count(&self.students)
    }
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) => text,
        Some(Raw::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

fn known_field(key: &str) -> Option<FieldKey> {
    let field = FieldKey::from_key(key);
    if field.is_none() {
        debug!(key, "Ignoring unknown field key");
    }
    field
}

fn known_scores<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<FieldKey, Score>, D::Error> {
    let raw = Option::<BTreeMap<String, Score>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, score)| known_field(&key).map(|field| (field, score)))
        .collect())
}

/// Accepts an array of indices or a `;`-separated string per field. Anything
/// that is not a non-negative integer is dropped.
fn known_challenges<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<FieldKey, BTreeSet<usize>>, D::Error> {
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let field = known_field(&key)?;
            let selected = challenge_indices(&value);
            (!selected.is_empty()).then_some((field, selected))
        })
        .collect())
}

fn challenge_indices(value: &Value) -> BTreeSet<usize> {
    match value {
        Value::Array(items) => items.iter().flat_map(challenge_indices).collect(),
        Value::Number(number) => number
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .into_iter()
            .collect(),
        Value::String(text) => text
            .split(';')
            .filter_map(|part| part.trim().parse::<usize>().ok())
            .collect(),
        _ => BTreeSet::new(),
    }
}

/// MTSS intervention tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    Universal,
    Targeted,
    Intensive,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::Universal => 1,
            Tier::Targeted => 2,
            Tier::Intensive => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Universal => "universal",
            Tier::Targeted => "targeted",
            Tier::Intensive => "intensive",
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(Tier::Universal),
            2 => Ok(Tier::Targeted),
            3 => Ok(Tier::Intensive),
            other => Err(format!("unknown tier {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Characterization {
    #[serde(rename = "high risk")]
    HighRisk,
    #[serde(rename = "moderate challenges")]
    ModerateChallenges,
    #[serde(rename = "stable")]
    Stable,
}

impl Characterization {
    pub fn label(self) -> &'static str {
        match self {
            Characterization::HighRisk => "high risk",
            Characterization::ModerateChallenges => "moderate challenges",
            Characterization::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSchool {
    #[serde(flatten)]
    pub school: SchoolRecord,
    pub tier: Tier,
    pub characterization: Characterization,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_schools: usize,
    pub total_students: i64,
    pub risky_schools: usize,
    pub excellent_schools: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MtssClassification {
    pub tier1: Vec<ClassifiedSchool>,
    pub tier2: Vec<ClassifiedSchool>,
    pub tier3: Vec<ClassifiedSchool>,
}

impl MtssClassification {
    pub fn len(&self) -> usize {
        self.tier1.len() + self.tier2.len() + self.tier3.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapEntry {
    pub field: FieldKey,
    pub label: &'static str,
    pub percentage: u32,
    pub low_schools: usize,
}

/// Histogram of valid scores; `counts[0]` holds score 1, `counts[4]` score 5.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectDistribution {
    pub field: FieldKey,
    pub label: &'static str,
    pub counts: [usize; 5],
}

impl SubjectDistribution {
    pub fn count(&self, score: u8) -> usize {
        match score {
            1..=5 => self.counts[usize::from(score - 1)],
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeCount {
    pub text: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChallenges {
    pub category: MainCategory,
    pub label: &'static str,
    pub challenges: Vec<ChallengeCount>,
    pub affected_schools: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAverage {
    pub field: FieldKey,
    pub name: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCount {
    pub name: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub schools: Vec<ClassifiedSchool>,
    pub summary: Summary,
    pub mtss_classification: MtssClassification,
    pub heatmap_data: Vec<HeatmapEntry>,
    pub subject_distribution: Vec<SubjectDistribution>,
    pub challenges_analysis: Vec<CategoryChallenges>,
    pub organizational_data: Vec<FieldAverage>,
    pub core_subjects_data: Vec<FieldAverage>,
    pub overall_performance_data: Vec<NamedCount>,
    pub school_size_data: Vec<NamedCount>,
    pub insights: Vec<Insight>,
}

impl AnalysisData {
    pub fn with_insights(mut self, insights: Vec<Insight>) -> Self {
        self.insights = insights;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedIssue {
    pub title: String,
    pub action: String,
    pub subject: String,
    pub context: String,
    pub result: String,
    pub vision: String,
    pub rationale: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalIssue {
    #[serde(flatten)]
    pub issue: GeneratedIssue,
    pub original_challenge: String,
    pub root_causes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSuggestion {
    pub main_goal: String,
    pub smart_objectives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOutcomes {
    #[serde(default)]
    pub outcomes: Vec<String>,
}

/// Schools that share a targeted (tier 2) intervention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier2Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub schools: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPlan {
    pub main_goal: String,
    #[serde(default)]
    pub smart_objectives: Vec<String>,
    #[serde(default)]
    pub tier1: TierOutcomes,
    #[serde(default)]
    pub tier2_groups: Vec<Tier2Group>,
    #[serde(default)]
    pub tier3: TierOutcomes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportPlanAction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub tier: Tier,
    pub target_audience: String,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportPlanPartner {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportPlanResource {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    AtRisk,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not started",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
            TaskStatus::AtRisk => "at risk",
        }
    }
}

/// One row of the operational work plan. Dates are optional until scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportPlanTask {
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub action_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportPlan {
    #[serde(default)]
    pub core_actions: Vec<SupportPlanAction>,
    #[serde(default)]
    pub partners: Vec<SupportPlanPartner>,
    #[serde(default)]
    pub resources: Vec<SupportPlanResource>,
    #[serde(default)]
    pub operational_plan: Vec<SupportPlanTask>,
}

/// Everything the `plan` command produces, saved as JSON so the supervisor
/// can edit dates and statuses before rendering the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument {
    pub issue: FinalIssue,
    pub intervention: InterventionPlan,
    pub support: SupportPlan,
}
