use tracing::debug;

use crate::aggregate;
use crate::models::{AnalysisData, SchoolRecord};
use crate::risk;
use crate::taxonomy::{MainCategory, Taxonomy};

/// Turns raw school records into the full derived report.
///
/// Pure and deterministic: the same input always yields the same value.
/// `insights` is left empty for the text-generation step to fill in.
pub fn analyze(schools: &[SchoolRecord], taxonomy: &Taxonomy) -> AnalysisData {
    let classified = risk::classify_schools(schools, taxonomy);
    let mtss_classification = aggregate::partition_tiers(&classified);

    let data = AnalysisData {
        summary: aggregate::summarize(&classified),
        heatmap_data: aggregate::build_heatmap(&classified, taxonomy),
        subject_distribution: aggregate::subject_distribution(&classified, taxonomy),
        challenges_analysis: aggregate::challenge_frequencies(&classified, taxonomy),
        organizational_data: aggregate::category_averages(
            &classified,
            taxonomy,
            MainCategory::LeadershipCulture,
        ),
        core_subjects_data: aggregate::category_averages(
            &classified,
            taxonomy,
            MainCategory::CoreSubjects,
        ),
        overall_performance_data: aggregate::overall_performance(&mtss_classification),
        school_size_data: aggregate::school_sizes(&classified),
        mtss_classification,
        schools: classified,
        insights: Vec::new(),
    };

    debug_assert_eq!(data.mtss_classification.len(), data.summary.total_schools);
    debug!(
        total_schools = data.summary.total_schools,
        tier1 = data.mtss_classification.tier1.len(),
        tier2 = data.mtss_classification.tier2.len(),
        tier3 = data.mtss_classification.tier3.len(),
        challenge_categories = data.challenges_analysis.len(),
        "Analysis complete"
    );

    data
}
