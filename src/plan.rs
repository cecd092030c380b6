//! Intervention and support plans seeded from the analysis and the plan
//! suggestion. The seeded plan is a starting point that the supervisor edits
//! in the saved JSON before rendering the report.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::models::{
    AnalysisData, ClassifiedSchool, FinalIssue, InterventionPlan, PlanDocument, PlanSuggestion,
    SupportPlan, SupportPlanAction, SupportPlanTask, TaskStatus, Tier, Tier2Group, TierOutcomes,
};
use crate::taxonomy::{CategoryDef, Taxonomy};

const RESPONSIBLE_SUPERVISOR: &str = "Supervisor";

struct ActionTemplate {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    tier: Tier,
    target_audience: &'static str,
    frequency: &'static str,
}

const ACTION_BANK: &[ActionTemplate] = &[
    ActionTemplate {
        name: "Principals' professional learning community",
        description: "Shared sessions on data-driven instructional leadership",
        category: "Professional development",
        tier: Tier::Universal,
        target_audience: "Principals",
        frequency: "Monthly",
    },
    ActionTemplate {
        name: "Supervision visits with feedback",
        description: "Classroom observations followed by a written feedback meeting",
        category: "Supervision",
        tier: Tier::Universal,
        target_audience: "Leadership teams",
        frequency: "Once a term",
    },
    ActionTemplate {
        name: "Focused workshops for tier 2 groups",
        description: "Workshop series on the shared weak area of each group",
        category: "Professional development",
        tier: Tier::Targeted,
        target_audience: "Subject coordinators",
        frequency: "Every two weeks",
    },
    ActionTemplate {
        name: "Intensive school support",
        description: "Weekly on-site coaching and a dedicated improvement plan",
        category: "Intervention",
        tier: Tier::Intensive,
        target_audience: "Principal and staff",
        frequency: "Weekly",
    },
];

/// Builds the intervention plan. Goal and objectives come from the
/// suggestion only when both are present; tier 2 schools are grouped by
/// their weakest main category.
pub fn seed_intervention_plan(
    suggestion: PlanSuggestion,
    data: &AnalysisData,
    taxonomy: &Taxonomy,
) -> InterventionPlan {
    let (main_goal, smart_objectives) =
        if suggestion.main_goal.trim().is_empty() || suggestion.smart_objectives.is_empty() {
            (String::new(), Vec::new())
        } else {
            (suggestion.main_goal, suggestion.smart_objectives)
        };

    let tiers = &data.mtss_classification;
    let tier1 = if tiers.tier1.is_empty() {
        TierOutcomes::default()
    } else {
        TierOutcomes {
            outcomes: vec![format!(
                "{} schools keep their current level with universal support",
                tiers.tier1.len()
            )],
        }
    };
    let tier3 = TierOutcomes {
        outcomes: tiers
            .tier3
            .iter()
            .map(|classified| {
                format!(
                    "{}: intensive improvement plan with monthly progress review",
                    classified.school.name
                )
            })
            .collect(),
    };

    InterventionPlan {
        main_goal,
        smart_objectives,
        tier1,
        tier2_groups: tier2_groups(&tiers.tier2, taxonomy),
        tier3,
    }
}

fn tier2_groups(schools: &[ClassifiedSchool], taxonomy: &Taxonomy) -> Vec<Tier2Group> {
    let mut groups: BTreeMap<usize, (&'static CategoryDef, Vec<String>)> = BTreeMap::new();
    let mut ungrouped = Vec::new();

    for classified in schools {
        match weakest_category(classified, taxonomy) {
            Some((position, def)) => groups
                .entry(position)
                .or_insert_with(|| (def, Vec::new()))
                .1
                .push(classified.school.name.clone()),
            None => ungrouped.push(classified.school.name.clone()),
        }
    }

    let mut result: Vec<Tier2Group> = groups
        .into_values()
        .map(|(def, mut names)| {
            names.sort();
            Tier2Group {
                id: String::new(),
                name: format!("Tier 2: {}", def.label),
                outcomes: vec![format!("Average {} score of 3 or above", def.label.to_lowercase())],
                schools: names,
            }
        })
        .collect();

    if !ungrouped.is_empty() {
        ungrouped.sort();
        result.push(Tier2Group {
            id: String::new(),
            name: "Tier 2: general support".to_string(),
            outcomes: Vec::new(),
            schools: ungrouped,
        });
    }

    for (index, group) in result.iter_mut().enumerate() {
        group.id = format!("tier2-{}", index + 1);
    }
    result
}

/// The category with the lowest mean of valid scores, first in taxonomy
/// order on ties. `None` when the school has no valid score.
fn weakest_category(
    classified: &ClassifiedSchool,
    taxonomy: &Taxonomy,
) -> Option<(usize, &'static CategoryDef)> {
    let mut weakest: Option<(f64, usize, &'static CategoryDef)> = None;
    for (position, def) in taxonomy.categories().iter().enumerate() {
        let scores: Vec<u8> = def
            .fields
            .iter()
            .filter_map(|field| classified.school.score(field.key).get())
            .collect();
        if scores.is_empty() {
            continue;
        }
        let mean = scores.iter().map(|&v| f64::from(v)).sum::<f64>() / scores.len() as f64;
        if weakest.map_or(true, |(lowest, _, _)| mean < lowest) {
            weakest = Some((mean, position, def));
        }
    }
    weakest.map(|(_, position, def)| (position, def))
}

/// Core actions for every tier that has work to do, plus one kickoff task
/// per action.
pub fn seed_support_plan(plan: &InterventionPlan, data: &AnalysisData) -> SupportPlan {
    let tiers = &data.mtss_classification;
    let needed = |tier: Tier| match tier {
        Tier::Universal => true,
        Tier::Targeted => !plan.tier2_groups.is_empty(),
        Tier::Intensive => !tiers.tier3.is_empty(),
    };

    let core_actions: Vec<SupportPlanAction> = ACTION_BANK
        .iter()
        .filter(|template| needed(template.tier))
        .enumerate()
        .map(|(index, template)| SupportPlanAction {
            id: format!("action-{}", index + 1),
            name: template.name.to_string(),
            description: template.description.to_string(),
            category: template.category.to_string(),
            tier: template.tier,
            target_audience: template.target_audience.to_string(),
            frequency: template.frequency.to_string(),
        })
        .collect();

    let operational_plan = core_actions
        .iter()
        .enumerate()
        .map(|(index, action)| SupportPlanTask {
            id: format!("task-{}", index + 1),
            task: format!("Launch: {}", action.name),
            responsible: RESPONSIBLE_SUPERVISOR.to_string(),
            start_date: None,
            end_date: None,
            status: TaskStatus::NotStarted,
            action_id: Some(action.id.clone()),
        })
        .collect();

    SupportPlan {
        core_actions,
        partners: Vec::new(),
        resources: Vec::new(),
        operational_plan,
    }
}

pub fn build_plan(
    issue: FinalIssue,
    suggestion: PlanSuggestion,
    data: &AnalysisData,
    taxonomy: &Taxonomy,
) -> PlanDocument {
    let intervention = seed_intervention_plan(suggestion, data, taxonomy);
    let support = seed_support_plan(&intervention, data);
    PlanDocument {
        issue,
        intervention,
        support,
    }
}

/// First and last day of the work plan, padded by two days on each side.
/// Only tasks with both dates set count.
pub fn timeline_span(tasks: &[SupportPlanTask]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = tasks.iter().filter_map(|task| match (task.start_date, task.end_date) {
        (Some(start), Some(end)) => Some((start.min(end), start.max(end))),
        _ => None,
    });

    let (first, last) = dates.fold(None, |span: Option<(NaiveDate, NaiveDate)>, (start, end)| {
        Some(match span {
            Some((first, last)) => (first.min(start), last.max(end)),
            None => (start, end),
        })
    })?;

    let padding = Days::new(2);
    Some((
        first.checked_sub_days(padding).unwrap_or(first),
        last.checked_add_days(padding).unwrap_or(last),
    ))
}

/// Unfinished tasks whose end date is before `today`.
pub fn overdue_tasks(tasks: &[SupportPlanTask], today: NaiveDate) -> Vec<&SupportPlanTask> {
    tasks
        .iter()
        .filter(|task| task.status != TaskStatus::Done)
        .filter(|task| task.end_date.is_some_and(|end| end < today))
        .collect()
}
