use crate::models::{Characterization, ClassifiedSchool, SchoolRecord, Tier};
use crate::taxonomy::Taxonomy;

/// Mean of the valid scores across every taxonomy field, `None` when the
/// school has no valid score at all.
pub fn mean_valid_score(school: &SchoolRecord, taxonomy: &Taxonomy) -> Option<f64> {
    let (sum, count) = taxonomy
        .fields()
        .filter_map(|field| school.score(field.key).get())
        .fold((0u32, 0u32), |(sum, count), value| {
            (sum + u32::from(value), count + 1)
        });

    if count == 0 {
        None
    } else {
        Some(f64::from(sum) / f64::from(count))
    }
}

// The empty-score fallbacks in `classify_tier` (mean of 5) and
// `characterize` (direct "stable") are independent. They agree today; any
// change to either threshold set must keep them aligned by hand.

pub fn classify_tier(school: &SchoolRecord, taxonomy: &Taxonomy) -> Tier {
    let mean = mean_valid_score(school, taxonomy).unwrap_or(5.0);
    tier_for_mean(mean)
}

pub fn tier_for_mean(mean: f64) -> Tier {
    match mean {
        m if m <= 2.5 => Tier::Intensive,
        m if m <= 3.5 => Tier::Targeted,
        _ => Tier::Universal,
    }
}

pub fn characterize(school: &SchoolRecord, taxonomy: &Taxonomy) -> Characterization {
    let Some(mean) = mean_valid_score(school, taxonomy) else {
        return Characterization::Stable;
    };

    match mean {
        m if m <= 2.5 => Characterization::HighRisk,
        m if m <= 3.5 => Characterization::ModerateChallenges,
        _ => Characterization::Stable,
    }
}

pub fn classify_school(school: &SchoolRecord, taxonomy: &Taxonomy) -> ClassifiedSchool {
    ClassifiedSchool {
        school: school.clone(),
        tier: classify_tier(school, taxonomy),
        characterization: characterize(school, taxonomy),
    }
}

pub fn classify_schools(schools: &[SchoolRecord], taxonomy: &Taxonomy) -> Vec<ClassifiedSchool> {
    schools
        .iter()
        .map(|school| classify_school(school, taxonomy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Score;
    use crate::taxonomy::FieldKey;

    fn school_with_scores(scores: &[(FieldKey, &str)]) -> SchoolRecord {
        SchoolRecord {
            id: 1,
            name: "Northgate".to_string(),
            scores: scores
                .iter()
                .map(|(key, raw)| (*key, Score::parse(raw)))
                .collect(),
            ..Default::default()
        }
    }

    fn uniform_school(raw: &str) -> SchoolRecord {
        let scores: Vec<(FieldKey, &str)> = FieldKey::ALL.iter().map(|key| (*key, raw)).collect();
        school_with_scores(&scores)
    }

    #[test]
    fn thresholds_follow_expected_tiers() {
        assert_eq!(tier_for_mean(1.0), Tier::Intensive);
        assert_eq!(tier_for_mean(2.5), Tier::Intensive);
        assert_eq!(tier_for_mean(2.51), Tier::Targeted);
        assert_eq!(tier_for_mean(3.5), Tier::Targeted);
        assert_eq!(tier_for_mean(3.51), Tier::Universal);
        assert_eq!(tier_for_mean(5.0), Tier::Universal);
    }

    #[test]
    fn all_max_school_is_universal_and_stable() {
        let school = uniform_school("5");
        let taxonomy = Taxonomy::standard();
        assert_eq!(classify_tier(&school, taxonomy), Tier::Universal);
        assert_eq!(characterize(&school, taxonomy), Characterization::Stable);
    }

    #[test]
    fn all_min_school_is_intensive_and_high_risk() {
        let school = uniform_school("1");
        let taxonomy = Taxonomy::standard();
        assert_eq!(classify_tier(&school, taxonomy), Tier::Intensive);
        assert_eq!(characterize(&school, taxonomy), Characterization::HighRisk);
    }

    #[test]
    fn empty_school_agrees_through_both_fallbacks() {
        let school = SchoolRecord::default();
        let taxonomy = Taxonomy::standard();
        assert_eq!(mean_valid_score(&school, taxonomy), None);
        assert_eq!(classify_tier(&school, taxonomy), Tier::Universal);
        assert_eq!(characterize(&school, taxonomy), Characterization::Stable);
    }

    #[test]
    fn absent_scores_are_excluded_from_the_mean() {
        let school = school_with_scores(&[
            (FieldKey::Leadership, "3"),
            (FieldKey::Mathematics, ""),
            (FieldKey::Science, "x"),
        ]);
        let taxonomy = Taxonomy::standard();
        assert_eq!(mean_valid_score(&school, taxonomy), Some(3.0));
        assert_eq!(classify_tier(&school, taxonomy), Tier::Targeted);
        assert_eq!(
            characterize(&school, taxonomy),
            Characterization::ModerateChallenges
        );
    }

    #[test]
    fn classification_keeps_the_source_record() {
        let school = school_with_scores(&[(FieldKey::Attendance, "2"), (FieldKey::English, "3")]);
        let classified = classify_school(&school, Taxonomy::standard());
        assert_eq!(classified.school, school);
        assert_eq!(classified.tier, Tier::Intensive);
        assert_eq!(classified.characterization, Characterization::HighRisk);
    }
}
