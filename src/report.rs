use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AnalysisData, ClassifiedSchool, PlanDocument};
use crate::plan;

fn tier_section(output: &mut String, title: &str, schools: &[ClassifiedSchool]) {
    let _ = writeln!(output, "### {} ({})", title, schools.len());
    if schools.is_empty() {
        let _ = writeln!(output, "No schools in this tier.");
        return;
    }
    for classified in schools {
        let school = &classified.school;
        let principal = if school.principal.is_empty() { "-" } else { school.principal.as_str() };
        let students = if school.students.is_empty() { "-" } else { school.students.as_str() };
        let _ = writeln!(
            output,
            "- {} (principal {}, {} students): {}",
            school.name,
            principal,
            students,
            classified.characterization.label()
        );
    }
}

pub fn build_report(
    supervisor: Option<&str>,
    generated_on: NaiveDate,
    data: &AnalysisData,
    plan: Option<&PlanDocument>,
) -> String {
    let mut output = String::new();
    let supervisor_label = supervisor.unwrap_or("unnamed supervisor");
    let summary = &data.summary;

    let _ = writeln!(output, "# School Mapping Analysis");
    let _ = writeln!(output, "Prepared for {} on {}", supervisor_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Schools: {}", summary.total_schools);
    let _ = writeln!(output, "- Students: {}", summary.total_students);
    let _ = writeln!(output, "- Schools at risk (tier 3): {}", summary.risky_schools);
    let _ = writeln!(output, "- Leading schools (tier 1): {}", summary.excellent_schools);

    let _ = writeln!(output);
    let _ = writeln!(output, "## MTSS Classification");
    let tiers = &data.mtss_classification;
    tier_section(&mut output, "Tier 1: universal support", &tiers.tier1);
    tier_section(&mut output, "Tier 2: targeted support", &tiers.tier2);
    tier_section(&mut output, "Tier 3: intensive intervention", &tiers.tier3);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Low Score Heatmap (scores 1-2)");
    for entry in &data.heatmap_data {
        let _ = writeln!(
            output,
            "- {}: {}% ({} schools)",
            entry.label, entry.percentage, entry.low_schools
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Core Subject Distribution");
    for dist in &data.subject_distribution {
        let _ = writeln!(
            output,
            "- {}: levels 1-2: {}, level 3: {}, levels 4-5: {}",
            dist.label,
            dist.count(1) + dist.count(2),
            dist.count(3),
            dist.count(4) + dist.count(5)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Scores");
    let _ = writeln!(output, "### Leadership and culture");
    for average in &data.organizational_data {
        let _ = writeln!(output, "- {}: {:.2}", average.name, average.value);
    }
    let _ = writeln!(output, "### Core subjects");
    for average in &data.core_subjects_data {
        let _ = writeln!(output, "- {}: {:.2}", average.name, average.value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Performance");
    for bucket in &data.overall_performance_data {
        let _ = writeln!(output, "- {}: {}", bucket.name, bucket.value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## School Size");
    if data.school_size_data.is_empty() {
        let _ = writeln!(output, "No schools recorded.");
    } else {
        for bucket in &data.school_size_data {
            let _ = writeln!(output, "- {}: {}", bucket.name, bucket.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Professional Challenges");
    if data.challenges_analysis.is_empty() {
        let _ = writeln!(output, "No professional challenges were identified in the data.");
    } else {
        for category in &data.challenges_analysis {
            let _ = writeln!(
                output,
                "### {} (identified in {} schools)",
                category.label, category.affected_schools
            );
            for challenge in category.challenges.iter().take(5) {
                let _ = writeln!(output, "- {}: {}", challenge.text, challenge.count);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Insights");
    if data.insights.is_empty() {
        let _ = writeln!(output, "Insights were not generated for this report.");
    } else {
        for insight in &data.insights {
            let _ = writeln!(output, "### {}", insight.title);
            let _ = writeln!(output, "{}", insight.text);
        }
    }

    if let Some(plan) = plan {
        plan_section(&mut output, plan, generated_on);
    }

    output
}

fn bullet_list(output: &mut String, items: &[String], empty: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "{}", empty);
    }
    for item in items {
        let _ = writeln!(output, "- {}", item);
    }
}

fn plan_section(output: &mut String, document: &PlanDocument, today: NaiveDate) {
    let issue = &document.issue.issue;
    let intervention = &document.intervention;
    let support = &document.support;

    let _ = writeln!(output);
    let _ = writeln!(output, "## Intervention Plan");
    let _ = writeln!(
        output,
        "**How can we {} {} {}, in order to {}?**",
        issue.action, issue.subject, issue.context, issue.result
    );
    let _ = writeln!(output, "Vision: {}", issue.vision);
    let _ = writeln!(output);
    let goal = if intervention.main_goal.is_empty() { "-" } else { intervention.main_goal.as_str() };
    let _ = writeln!(output, "Main goal: {}", goal);
    let _ = writeln!(output, "### SMART objectives");
    bullet_list(output, &intervention.smart_objectives, "No objectives set.");
    let _ = writeln!(output, "### Tier 1 outcomes");
    bullet_list(output, &intervention.tier1.outcomes, "No outcomes set.");
    let _ = writeln!(output, "### Tier 2 groups");
    if intervention.tier2_groups.is_empty() {
        let _ = writeln!(output, "No tier 2 groups.");
    }
    for group in &intervention.tier2_groups {
        let _ = writeln!(output, "- {} ({})", group.name, group.schools.join(", "));
        for outcome in &group.outcomes {
            let _ = writeln!(output, "  - {}", outcome);
        }
    }
    let _ = writeln!(output, "### Tier 3 outcomes");
    bullet_list(output, &intervention.tier3.outcomes, "No outcomes set.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Support Plan");
    let _ = writeln!(output, "### Core actions");
    if support.core_actions.is_empty() {
        let _ = writeln!(output, "No core actions.");
    }
    for action in &support.core_actions {
        let _ = writeln!(
            output,
            "- {} [{}, tier {}]: {} ({}, {})",
            action.name,
            action.category,
            action.tier.number(),
            action.description,
            action.target_audience,
            action.frequency
        );
    }
    let _ = writeln!(output, "### Partners");
    if support.partners.is_empty() {
        let _ = writeln!(output, "No partners listed.");
    }
    for partner in &support.partners {
        let _ = writeln!(output, "- {} [{}]: {}", partner.name, partner.category, partner.role);
    }
    let _ = writeln!(output, "### Resources");
    if support.resources.is_empty() {
        let _ = writeln!(output, "No resources listed.");
    }
    for resource in &support.resources {
        let _ = writeln!(output, "- {} [{}]: {}", resource.name, resource.category, resource.details);
    }

    let _ = writeln!(output, "### Work plan");
    match plan::timeline_span(&support.operational_plan) {
        Some((first, last)) => {
            let _ = writeln!(output, "Timeline: {} to {}", first, last);
        }
        None => {
            let _ = writeln!(output, "No scheduled tasks yet.");
        }
    }
    let overdue: Vec<&str> = plan::overdue_tasks(&support.operational_plan, today)
        .iter()
        .map(|task| task.id.as_str())
        .collect();
    let _ = writeln!(output, "| Task | Responsible | Start | End | Status |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    let date = |value: Option<NaiveDate>| value.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    for task in &support.operational_plan {
        let status = if overdue.contains(&task.id.as_str()) {
            format!("{} (overdue)", task.status.label())
        } else {
            task.status.label().to_string()
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            task.task,
            task.responsible,
            date(task.start_date),
            date(task.end_date),
            status
        );
    }
}
