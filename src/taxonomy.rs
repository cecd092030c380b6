//! Evaluation taxonomy: main categories, their fields, and the fixed
//! challenge phrases a supervisor can pick for each field.
//!
//! The standard taxonomy is a process-wide `static` and is never mutated.
//! Everything downstream takes a `&Taxonomy` so tests can swap in a smaller one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Leadership,
    SchoolClimate,
    StaffDevelopment,
    ParentPartnership,
    Language,
    Mathematics,
    English,
    Science,
    InstructionQuality,
    Differentiation,
    AssessmentPractice,
    Attendance,
    SocialEmotional,
    SpecialEducation,
}

impl FieldKey {
    pub const ALL: [FieldKey; 14] = [
        FieldKey::Leadership,
        FieldKey::SchoolClimate,
        FieldKey::StaffDevelopment,
        FieldKey::ParentPartnership,
        FieldKey::Language,
        FieldKey::Mathematics,
        FieldKey::English,
        FieldKey::Science,
        FieldKey::InstructionQuality,
        FieldKey::Differentiation,
        FieldKey::AssessmentPractice,
        FieldKey::Attendance,
        FieldKey::SocialEmotional,
        FieldKey::SpecialEducation,
    ];

    /// Stable identifier used in CSV headers and JSON keys.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Leadership => "leadership",
            FieldKey::SchoolClimate => "school_climate",
            FieldKey::StaffDevelopment => "staff_development",
            FieldKey::ParentPartnership => "parent_partnership",
            FieldKey::Language => "language",
            FieldKey::Mathematics => "mathematics",
            FieldKey::English => "english",
            FieldKey::Science => "science",
            FieldKey::InstructionQuality => "instruction_quality",
            FieldKey::Differentiation => "differentiation",
            FieldKey::AssessmentPractice => "assessment_practice",
            FieldKey::Attendance => "attendance",
            FieldKey::SocialEmotional => "social_emotional",
            FieldKey::SpecialEducation => "special_education",
        }
    }

    pub fn from_key(value: &str) -> Option<FieldKey> {
        FieldKey::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainCategory {
    LeadershipCulture,
    CoreSubjects,
    TeachingLearning,
    StudentWellbeing,
}

#[derive(Debug)]
pub struct FieldDef {
    pub key: FieldKey,
    pub label: &'static str,
    pub challenges: &'static [&'static str],
}

#[derive(Debug)]
pub struct CategoryDef {
    pub category: MainCategory,
    pub label: &'static str,
    pub fields: &'static [FieldDef],
}

#[derive(Debug)]
pub struct Taxonomy {
    categories: &'static [CategoryDef],
}

impl Taxonomy {
    pub const fn new(categories: &'static [CategoryDef]) -> Self {
        Self { categories }
    }

    pub fn standard() -> &'static Taxonomy {
        &STANDARD
    }

    pub fn categories(&self) -> &'static [CategoryDef] {
        self.categories
    }

    pub fn category(&self, category: MainCategory) -> Option<&'static CategoryDef> {
        self.categories.iter().find(|def| def.category == category)
    }

    /// Every evaluation field in taxonomy order. This is the heatmap field list.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.categories.iter().flat_map(|def| def.fields.iter())
    }

    pub fn field(&self, key: FieldKey) -> Option<&'static FieldDef> {
        self.fields().find(|def| def.key == key)
    }

    /// Resolves a selected challenge index to its phrase, if the index exists.
    pub fn challenge(&self, key: FieldKey, index: usize) -> Option<&'static str> {
        self.field(key)
            .and_then(|def| def.challenges.get(index))
            .copied()
    }
}

static STANDARD: Taxonomy = Taxonomy::new(&[
    CategoryDef {
        category: MainCategory::LeadershipCulture,
        label: "Leadership and school culture",
        fields: &[
            FieldDef {
                key: FieldKey::Leadership,
                label: "Pedagogical leadership",
                challenges: &[
                    "No shared pedagogical vision",
                    "Principal absorbed by administrative work",
                    "Weak middle-management layer",
                    "Decisions are not grounded in data",
                ],
            },
            FieldDef {
                key: FieldKey::SchoolClimate,
                label: "School climate",
                challenges: &[
                    "Recurring violence or bullying incidents",
                    "Low sense of belonging among students",
                    "Unclear behavior expectations",
                    "Tension within the staff",
                ],
            },
            FieldDef {
                key: FieldKey::StaffDevelopment,
                label: "Staff professional development",
                challenges: &[
                    "Training not tied to school needs",
                    "High teacher turnover",
                    "Little peer learning",
                    "Resistance to pedagogical change",
                ],
            },
            FieldDef {
                key: FieldKey::ParentPartnership,
                label: "Parent and community partnership",
                challenges: &[
                    "Low parent involvement",
                    "Communication with families is one-directional",
                    "Few community partners",
                ],
            },
        ],
    },
    CategoryDef {
        category: MainCategory::CoreSubjects,
        label: "Core subject achievement",
        fields: &[
            FieldDef {
                key: FieldKey::Language,
                label: "Language and literacy",
                challenges: &[
                    "Reading comprehension gaps",
                    "Weak written expression",
                    "Limited vocabulary",
                    "Early literacy not consolidated",
                ],
            },
            FieldDef {
                key: FieldKey::Mathematics,
                label: "Mathematics",
                challenges: &[
                    "Gaps in foundational arithmetic",
                    "Difficulty with word problems",
                    "Shortage of qualified math teachers",
                    "Large achievement spread within classes",
                ],
            },
            FieldDef {
                key: FieldKey::English,
                label: "English",
                challenges: &[
                    "Low oral proficiency",
                    "Reading fluency below grade level",
                    "Insufficient instructional hours",
                ],
            },
            FieldDef {
                key: FieldKey::Science,
                label: "Science",
                challenges: &[
                    "Lab equipment missing or outdated",
                    "Little inquiry-based learning",
                    "Low student interest in science",
                ],
            },
        ],
    },
    CategoryDef {
        category: MainCategory::TeachingLearning,
        label: "Teaching and learning",
        fields: &[
            FieldDef {
                key: FieldKey::InstructionQuality,
                label: "Quality of instruction",
                challenges: &[
                    "Teacher-centered lessons dominate",
                    "Low cognitive demand in tasks",
                    "Poor use of lesson time",
                ],
            },
            FieldDef {
                key: FieldKey::Differentiation,
                label: "Differentiated instruction",
                challenges: &[
                    "No adaptation for struggling learners",
                    "No enrichment for advanced learners",
                    "Grouping practices are rigid",
                ],
            },
            FieldDef {
                key: FieldKey::AssessmentPractice,
                label: "Assessment practice",
                challenges: &[
                    "Assessment used only for grading",
                    "Results are not analyzed by staff",
                    "Feedback to students is sparse",
                ],
            },
        ],
    },
    CategoryDef {
        category: MainCategory::StudentWellbeing,
        label: "Student wellbeing",
        fields: &[
            FieldDef {
                key: FieldKey::Attendance,
                label: "Attendance",
                challenges: &[
                    "Chronic absenteeism",
                    "Frequent lateness",
                    "Dropout risk among older students",
                ],
            },
            FieldDef {
                key: FieldKey::SocialEmotional,
                label: "Social-emotional learning",
                challenges: &[
                    "No structured SEL program",
                    "Counseling staff overloaded",
                    "Students report high anxiety",
                ],
            },
            FieldDef {
                key: FieldKey::SpecialEducation,
                label: "Special education inclusion",
                challenges: &[
                    "Individual plans not implemented",
                    "Shortage of support staff",
                    "Accessibility barriers in the building",
                ],
            },
        ],
    },
]);
