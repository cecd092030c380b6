//! Reductions over the classified school set. Each one is independent of
//! the others and only reads the per-school classification.

use std::collections::BTreeSet;

use crate::models::{
    CategoryChallenges, ChallengeCount, ClassifiedSchool, FieldAverage, HeatmapEntry,
    MtssClassification, NamedCount, SubjectDistribution, Summary, Tier,
};
use crate::taxonomy::{FieldDef, MainCategory, Taxonomy};

pub fn summarize(schools: &[ClassifiedSchool]) -> Summary {
    Summary {
        total_schools: schools.len(),
        total_students: schools
            .iter()
            .fold(0i64, |total, s| total.saturating_add(s.school.student_count())),
        risky_schools: count_tier(schools, Tier::Intensive),
        excellent_schools: count_tier(schools, Tier::Universal),
    }
}

fn count_tier(schools: &[ClassifiedSchool], tier: Tier) -> usize {
    schools.iter().filter(|s| s.tier == tier).count()
}

pub fn partition_tiers(schools: &[ClassifiedSchool]) -> MtssClassification {
    let mut classification = MtssClassification::default();
    for school in schools {
        let bucket = match school.tier {
            Tier::Universal => &mut classification.tier1,
            Tier::Targeted => &mut classification.tier2,
            Tier::Intensive => &mut classification.tier3,
        };
        bucket.push(school.clone());
    }
    classification
}

/// Share of schools scoring 1–2 on each field.
///
/// Absent or malformed scores count as 0 here and therefore as low. The
/// subject distribution excludes them instead; both behaviors are kept.
pub fn build_heatmap(schools: &[ClassifiedSchool], taxonomy: &Taxonomy) -> Vec<HeatmapEntry> {
    taxonomy
        .fields()
        .map(|field| {
            let low_schools = schools
                .iter()
                .filter(|s| s.school.score(field.key).value() <= 2)
                .count();
            HeatmapEntry {
                field: field.key,
                label: field.label,
                percentage: percentage(low_schools, schools.len()),
                low_schools,
            }
        })
        .collect()
}

pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as u32
    }
}

pub fn subject_distribution(
    schools: &[ClassifiedSchool],
    taxonomy: &Taxonomy,
) -> Vec<SubjectDistribution> {
    let Some(core) = taxonomy.category(MainCategory::CoreSubjects) else {
        return Vec::new();
    };

    core.fields
        .iter()
        .map(|field| {
            let mut counts = [0usize; 5];
            for school in schools {
                if let Some(value) = school.school.score(field.key).get() {
                    counts[usize::from(value - 1)] += 1;
                }
            }
            SubjectDistribution {
                field: field.key,
                label: field.label,
                counts,
            }
        })
        .collect()
}

pub fn challenge_frequencies(
    schools: &[ClassifiedSchool],
    taxonomy: &Taxonomy,
) -> Vec<CategoryChallenges> {
    let mut categories = Vec::new();

    for def in taxonomy.categories() {
        // Seed in taxonomy order so equal counts keep a fixed order.
        let mut tally: Vec<ChallengeCount> = Vec::new();
        for text in def.fields.iter().flat_map(|field| field.challenges.iter().copied()) {
            if !tally.iter().any(|entry| entry.text == text) {
                tally.push(ChallengeCount { text, count: 0 });
            }
        }

        let mut affected = BTreeSet::new();
        for field in def.fields {
            for classified in schools {
                let school = &classified.school;
                for index in school.selected_challenges(field.key) {
                    let Some(text) = field.challenges.get(index) else {
                        continue;
                    };
                    if let Some(entry) = tally.iter_mut().find(|entry| entry.text == *text) {
                        entry.count += 1;
                        affected.insert(school.id);
                    }
                }
            }
        }

        tally.retain(|entry| entry.count > 0);
        if tally.is_empty() {
            continue;
        }
        tally.sort_by(|a, b| b.count.cmp(&a.count));

        categories.push(CategoryChallenges {
            category: def.category,
            label: def.label,
            challenges: tally,
            affected_schools: affected.len(),
        });
    }

    categories.sort_by(|a, b| b.affected_schools.cmp(&a.affected_schools));
    categories
}

pub fn field_averages(schools: &[ClassifiedSchool], fields: &[FieldDef]) -> Vec<FieldAverage> {
    fields
        .iter()
        .map(|field| {
            let valid: Vec<u8> = schools
                .iter()
                .filter_map(|s| s.school.score(field.key).get())
                .collect();
            let value = if valid.is_empty() {
                0.0
            } else {
                let sum: u32 = valid.iter().map(|v| u32::from(*v)).sum();
                round2(f64::from(sum) / valid.len() as f64)
            };
            FieldAverage {
                field: field.key,
                name: field.label,
                value,
            }
        })
        .collect()
}

pub fn category_averages(
    schools: &[ClassifiedSchool],
    taxonomy: &Taxonomy,
    category: MainCategory,
) -> Vec<FieldAverage> {
    taxonomy
        .category(category)
        .map(|def| field_averages(schools, def.fields))
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Tier counts ordered from lowest to highest quality.
pub fn overall_performance(classification: &MtssClassification) -> Vec<NamedCount> {
    vec![
        NamedCount {
            name: "Tier 3 (low)",
            value: classification.tier3.len(),
        },
        NamedCount {
            name: "Tier 2 (medium)",
            value: classification.tier2.len(),
        },
        NamedCount {
            name: "Tier 1 (high)",
            value: classification.tier1.len(),
        },
    ]
}

const SIZE_BUCKETS: [&str; 4] = [
    "Small (up to 250)",
    "Medium (251-400)",
    "Large (401-600)",
    "Very large (600+)",
];

pub fn size_bucket(students: i64) -> usize {
    match students {
        i64::MIN..=250 => 0,
        251..=400 => 1,
        401..=600 => 2,
        _ => 3,
    }
}

/// School counts per size range; empty ranges are left out.
pub fn school_sizes(schools: &[ClassifiedSchool]) -> Vec<NamedCount> {
    let mut counts = [0usize; 4];
    for school in schools {
        counts[size_bucket(school.school.student_count())] += 1;
    }

    SIZE_BUCKETS
        .into_iter()
        .zip(counts)
        .filter(|(_, value)| *value > 0)
        .map(|(name, value)| NamedCount { name, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::models::SchoolRecord;
    use crate::normalize::Score;
    use crate::risk::classify_schools;
    use crate::taxonomy::FieldKey;

    fn school(id: u32, students: &str, scores: &[(FieldKey, &str)]) -> SchoolRecord {
        SchoolRecord {
            id,
            name: format!("School {id}"),
            students: students.to_string(),
            scores: scores
                .iter()
                .map(|(key, raw)| (*key, Score::parse(raw)))
                .collect(),
            ..Default::default()
        }
    }

    fn with_challenges(mut record: SchoolRecord, picks: &[(FieldKey, &[usize])]) -> SchoolRecord {
        let challenges: BTreeMap<FieldKey, BTreeSet<usize>> = picks
            .iter()
            .map(|(key, indices)| (*key, indices.iter().copied().collect()))
            .collect();
        record.challenges = challenges;
        record
    }

    fn classify(records: &[SchoolRecord]) -> Vec<ClassifiedSchool> {
        classify_schools(records, Taxonomy::standard())
    }

    #[test]
    fn summary_sums_students_and_counts_tiers() {
        let schools = classify(&[
            school(1, "300", &[(FieldKey::Leadership, "5")]),
            school(2, "n/a", &[(FieldKey::Leadership, "1")]),
            school(3, "120", &[(FieldKey::Leadership, "3")]),
        ]);
        let summary = summarize(&schools);
        assert_eq!(summary.total_schools, 3);
        assert_eq!(summary.total_students, 420);
        assert_eq!(summary.risky_schools, 1);
        assert_eq!(summary.excellent_schools, 1);
    }

    #[test]
    fn summary_student_total_saturates_on_huge_counts() {
        let schools = classify(&[
            school(1, "99999999999999999999", &[]),
            school(2, "99999999999999999999", &[]),
            school(3, "-5", &[]),
        ]);
        assert_eq!(summarize(&schools).total_students, i64::MAX - 5);
    }

    #[test]
    fn heatmap_counts_absent_scores_as_low() {
        let schools = classify(&[
            school(1, "", &[(FieldKey::Mathematics, "4")]),
            school(2, "", &[(FieldKey::Mathematics, "")]),
            school(3, "", &[(FieldKey::Mathematics, "2")]),
        ]);
        let heatmap = build_heatmap(&schools, Taxonomy::standard());
        let math = heatmap
            .iter()
            .find(|entry| entry.field == FieldKey::Mathematics)
            .unwrap();
        assert_eq!(math.low_schools, 2);
        assert_eq!(math.percentage, 67);
        assert_eq!(heatmap.len(), FieldKey::ALL.len());
    }

    #[test]
    fn heatmap_is_zero_without_schools() {
        let heatmap = build_heatmap(&[], Taxonomy::standard());
        assert!(heatmap.iter().all(|e| e.percentage == 0 && e.low_schools == 0));
    }

    #[test]
    fn heatmap_never_drops_when_low_schools_are_added() {
        let mut records = vec![
            school(1, "", &[(FieldKey::Science, "5")]),
            school(2, "", &[(FieldKey::Science, "4")]),
        ];
        let mut previous = 0;
        for id in 3..8 {
            records.push(school(id, "", &[(FieldKey::Science, "1")]));
            let heatmap = build_heatmap(&classify(&records), Taxonomy::standard());
            let science = heatmap
                .iter()
                .find(|e| e.field == FieldKey::Science)
                .unwrap()
                .percentage;
            assert!(science >= previous);
            previous = science;
        }
    }

    #[test]
    fn distribution_skips_absent_scores() {
        let schools = classify(&[
            school(1, "", &[(FieldKey::English, "1")]),
            school(2, "", &[(FieldKey::English, "5")]),
            school(3, "", &[(FieldKey::English, "")]),
            school(4, "", &[(FieldKey::English, "5")]),
        ]);
        let distribution = subject_distribution(&schools, Taxonomy::standard());
        assert_eq!(distribution.len(), 4);
        let english = distribution
            .iter()
            .find(|d| d.field == FieldKey::English)
            .unwrap();
        assert_eq!(english.counts, [1, 0, 0, 0, 2]);
        assert_eq!(english.counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn challenges_count_phrases_and_affected_schools() {
        let schools = classify(&[
            with_challenges(
                school(1, "", &[]),
                &[(FieldKey::Mathematics, &[0, 1]), (FieldKey::Language, &[0])],
            ),
            with_challenges(school(2, "", &[]), &[(FieldKey::Mathematics, &[1])]),
            with_challenges(school(3, "", &[]), &[(FieldKey::Attendance, &[0])]),
        ]);
        let analysis = challenge_frequencies(&schools, Taxonomy::standard());

        assert_eq!(analysis.len(), 2);
        let core = &analysis[0];
        assert_eq!(core.category, MainCategory::CoreSubjects);
        assert_eq!(core.affected_schools, 2);
        assert_eq!(core.challenges[0].text, "Difficulty with word problems");
        assert_eq!(core.challenges[0].count, 2);
        assert_eq!(core.challenges.len(), 3);

        let wellbeing = &analysis[1];
        assert_eq!(wellbeing.category, MainCategory::StudentWellbeing);
        assert_eq!(wellbeing.affected_schools, 1);
    }

    #[test]
    fn categories_without_selections_are_omitted() {
        let schools = classify(&[with_challenges(
            school(1, "", &[]),
            &[(FieldKey::Leadership, &[2])],
        )]);
        let analysis = challenge_frequencies(&schools, Taxonomy::standard());
        assert_eq!(analysis.len(), 1);
        assert_eq!(analysis[0].category, MainCategory::LeadershipCulture);
        assert!(analysis
            .iter()
            .all(|c| c.category != MainCategory::CoreSubjects));
    }

    #[test]
    fn invalid_challenge_indices_are_skipped_entirely() {
        let schools = classify(&[with_challenges(
            school(1, "", &[]),
            &[(FieldKey::Science, &[42])],
        )]);
        assert!(challenge_frequencies(&schools, Taxonomy::standard()).is_empty());
    }

    #[test]
    fn tied_categories_keep_taxonomy_order() {
        let schools = classify(&[
            with_challenges(school(1, "", &[]), &[(FieldKey::Attendance, &[0])]),
            with_challenges(school(2, "", &[]), &[(FieldKey::Leadership, &[0])]),
        ]);
        let analysis = challenge_frequencies(&schools, Taxonomy::standard());
        let order: Vec<MainCategory> = analysis.iter().map(|c| c.category).collect();
        assert_eq!(
            order,
            vec![MainCategory::LeadershipCulture, MainCategory::StudentWellbeing]
        );
    }

    #[test]
    fn averages_ignore_absent_scores_and_round() {
        let schools = classify(&[
            school(1, "", &[(FieldKey::Leadership, "4"), (FieldKey::SchoolClimate, "")]),
            school(2, "", &[(FieldKey::Leadership, "5")]),
            school(3, "", &[(FieldKey::Leadership, "4")]),
        ]);
        let averages =
            category_averages(&schools, Taxonomy::standard(), MainCategory::LeadershipCulture);
        assert_eq!(averages.len(), 4);
        assert_eq!(averages[0].field, FieldKey::Leadership);
        assert_eq!(averages[0].value, 4.33);
        assert_eq!(averages[1].value, 0.0);
    }

    #[test]
    fn overall_performance_lists_low_to_high() {
        let schools = classify(&[
            school(1, "", &[(FieldKey::Leadership, "1")]),
            school(2, "", &[(FieldKey::Leadership, "1")]),
            school(3, "", &[(FieldKey::Leadership, "5")]),
        ]);
        let buckets = overall_performance(&partition_tiers(&schools));
        let values: Vec<usize> = buckets.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![2, 0, 1]);
    }

    #[test]
    fn size_buckets_cover_boundaries() {
        assert_eq!(size_bucket(0), 0);
        assert_eq!(size_bucket(250), 0);
        assert_eq!(size_bucket(251), 1);
        assert_eq!(size_bucket(400), 1);
        assert_eq!(size_bucket(401), 2);
        assert_eq!(size_bucket(600), 2);
        assert_eq!(size_bucket(601), 3);
    }

    #[test]
    fn single_medium_school_fills_only_one_bucket() {
        let schools = classify(&[school(1, "300", &[])]);
        let sizes = school_sizes(&schools);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].name, "Medium (251-400)");
        assert_eq!(sizes[0].value, 1);
    }

    #[test]
    fn non_numeric_sizes_count_as_small() {
        let schools = classify(&[school(1, "unknown", &[]), school(2, "700", &[])]);
        let sizes = school_sizes(&schools);
        let names: Vec<&str> = sizes.iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Small (up to 250)", "Very large (600+)"]);
    }
}
