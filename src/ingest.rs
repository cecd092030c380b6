use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::SchoolRecord;
use crate::normalize::Score;
use crate::taxonomy::FieldKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Id,
    Name,
    Principal,
    Students,
    Notes,
    Score(FieldKey),
    Challenges(FieldKey),
    Ignored,
}

fn column_for(header: &str) -> Column {
    match header.trim().trim_start_matches('\u{feff}') {
        "id" => Column::Id,
        "name" => Column::Name,
        "principal" => Column::Principal,
        "students" => Column::Students,
        "notes" => Column::Notes,
        other => {
            if let Some(key) = other.strip_suffix("_score").and_then(FieldKey::from_key) {
                Column::Score(key)
            } else if let Some(key) = other.strip_suffix("_challenges").and_then(FieldKey::from_key) {
                Column::Challenges(key)
            } else {
                Column::Ignored
            }
        }
    }
}

/// Loads school records from a `.json` array or a CSV mapping file.
pub fn load_schools(path: &Path) -> anyhow::Result<Vec<SchoolRecord>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let schools = if is_json {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        read_schools_json(BufReader::new(file))
            .with_context(|| format!("failed to parse school records in {}", path.display()))?
    } else {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_schools_csv(reader)?
    };

    info!(path = %path.display(), schools = schools.len(), "School records loaded");
    let unscored = schools
        .iter()
        .filter(|school| !school.scores.values().any(|score| score.is_valid()))
        .count();
    if unscored > 0 {
        warn!(unscored, "Schools without any valid score are treated as stable");
    }
    Ok(schools)
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Unknown field keys and invalid challenge indices are dropped per record;
/// only structurally broken JSON fails the load.
pub fn read_schools_json<R: Read>(reader: R) -> serde_json::Result<Vec<SchoolRecord>> {
    serde_json::from_reader(reader)
}

pub fn read_schools_csv<R: Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<SchoolRecord>> {
    let headers = reader.headers()?.clone();
    let columns: Vec<Column> = headers.iter().map(column_for).collect();
    for (header, column) in headers.iter().zip(&columns) {
        if *column == Column::Ignored {
            debug!(header, "Ignoring unknown CSV column");
        }
    }

    let mut rows: Vec<(Option<u32>, SchoolRecord)> = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut id = None;
        let mut school = SchoolRecord::default();

        for (column, value) in columns.iter().zip(row.iter()) {
            match *column {
                Column::Id => id = value.trim().parse::<u32>().ok(),
                Column::Name => school.name = value.trim().to_string(),
                Column::Principal => school.principal = value.trim().to_string(),
                Column::Students => school.students = value.trim().to_string(),
                Column::Notes => school.notes = value.to_string(),
                Column::Score(key) => {
                    school.scores.insert(key, Score::parse(value));
                }
                Column::Challenges(key) => {
                    let selected = parse_challenge_indices(value);
                    if !selected.is_empty() {
                        school.challenges.insert(key, selected);
                    }
                }
                Column::Ignored => {}
            }
        }

        rows.push((id, school));
    }

    let mut next_id = rows.iter().filter_map(|(id, _)| *id).max().unwrap_or(0);
    let mut seen = HashSet::new();
    let schools = rows
        .into_iter()
        .map(|(id, mut school)| {
            school.id = match id {
                Some(id) => id,
                None => match next_id.checked_add(1) {
                    Some(assigned) => {
                        next_id = assigned;
                        assigned
                    }
                    None => {
                        warn!(name = %school.name, "No school id left to assign, reusing the highest id");
                        next_id
                    }
                },
            };
            if !seen.insert(school.id) {
                warn!(id = school.id, name = %school.name, "Duplicate school id in CSV");
            }
            school
        })
        .collect();

    Ok(schools)
}

/// Splits a `;`-separated list of challenge indices, dropping anything unparseable.
pub fn parse_challenge_indices(raw: &str) -> BTreeSet<usize> {
    raw.split(';')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .collect()
}

pub fn write_schools_csv<W: Write>(writer: W, schools: &[SchoolRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut headers: Vec<String> = ["id", "name", "principal", "students", "notes"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    headers.extend(FieldKey::ALL.iter().map(|key| format!("{}_score", key.as_str())));
    headers.extend(FieldKey::ALL.iter().map(|key| format!("{}_challenges", key.as_str())));
    writer.write_record(&headers)?;

    for school in schools {
        let mut row = vec![
            school.id.to_string(),
            school.name.clone(),
            school.principal.clone(),
            school.students.clone(),
            school.notes.clone(),
        ];
        row.extend(FieldKey::ALL.iter().map(|key| school.score(*key).to_string()));
        row.extend(FieldKey::ALL.iter().map(|key| {
            school
                .selected_challenges(*key)
                .map(|index| index.to_string())
                .collect::<Vec<_>>()
                .join(";")
        }));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Realistic mapping data for trying the tool end to end.
pub fn sample_schools() -> Vec<SchoolRecord> {
    use FieldKey::*;

    fn record(
        id: u32,
        name: &str,
        principal: &str,
        students: &str,
        notes: &str,
        scores: &[(FieldKey, u8)],
        challenges: &[(FieldKey, &[usize])],
    ) -> SchoolRecord {
        SchoolRecord {
            id,
            name: name.to_string(),
            principal: principal.to_string(),
            students: students.to_string(),
            notes: notes.to_string(),
            scores: scores
                .iter()
                .map(|(key, value)| (*key, Score::from_number(i64::from(*value))))
                .collect::<BTreeMap<_, _>>(),
            challenges: challenges
                .iter()
                .map(|(key, picks)| (*key, picks.iter().copied().collect()))
                .collect(),
        }
    }

    vec![
        record(
            1,
            "Oak Valley Elementary",
            "Dana Cohen",
            "310",
            "New principal this year",
            &[
                (Leadership, 4),
                (SchoolClimate, 4),
                (StaffDevelopment, 3),
                (ParentPartnership, 5),
                (Language, 4),
                (Mathematics, 3),
                (English, 4),
                (Science, 4),
                (InstructionQuality, 4),
                (Differentiation, 3),
                (AssessmentPractice, 4),
                (Attendance, 5),
                (SocialEmotional, 4),
                (SpecialEducation, 4),
            ],
            &[(Mathematics, &[1]), (Differentiation, &[1])],
        ),
        record(
            2,
            "Harbor Middle School",
            "Eli Navon",
            "640",
            "",
            &[
                (Leadership, 2),
                (SchoolClimate, 1),
                (StaffDevelopment, 2),
                (ParentPartnership, 2),
                (Language, 2),
                (Mathematics, 1),
                (English, 2),
                (Science, 3),
                (InstructionQuality, 2),
                (Differentiation, 1),
                (AssessmentPractice, 2),
                (Attendance, 1),
                (SocialEmotional, 2),
                (SpecialEducation, 2),
            ],
            &[
                (SchoolClimate, &[0, 1]),
                (Mathematics, &[0, 3]),
                (Language, &[0]),
                (Attendance, &[0, 2]),
                (StaffDevelopment, &[1]),
            ],
        ),
        record(
            3,
            "Cedar Ridge Primary",
            "Maya Levi",
            "180",
            "Small rural school",
            &[
                (Leadership, 3),
                (SchoolClimate, 4),
                (Language, 3),
                (Mathematics, 2),
                (English, 3),
                (Science, 3),
                (Attendance, 3),
            ],
            &[(Mathematics, &[0, 2]), (Science, &[0])],
        ),
        record(
            4,
            "Lakeside Community School",
            "Omar Haddad",
            "455",
            "",
            &[
                (Leadership, 5),
                (SchoolClimate, 5),
                (StaffDevelopment, 4),
                (Language, 5),
                (Mathematics, 4),
                (English, 5),
                (Science, 4),
                (InstructionQuality, 5),
                (SocialEmotional, 5),
            ],
            &[],
        ),
        record(
            5,
            "Westfield Junior High",
            "Ruth Amir",
            "520",
            "Mapping visit pending",
            &[],
            &[],
        ),
        record(
            6,
            "Pine Street Elementary",
            "Noa Shalev",
            "275",
            "",
            &[
                (Leadership, 3),
                (SchoolClimate, 2),
                (StaffDevelopment, 3),
                (Language, 2),
                (Mathematics, 3),
                (English, 2),
                (Science, 2),
                (Attendance, 2),
                (SocialEmotional, 3),
            ],
            &[
                (Language, &[0, 1]),
                (SchoolClimate, &[1]),
                (Attendance, &[0]),
                (SocialEmotional, &[1]),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(data.as_bytes())
    }

    #[test]
    fn headers_map_to_field_columns() {
        assert_eq!(column_for("mathematics_score"), Column::Score(FieldKey::Mathematics));
        assert_eq!(
            column_for("school_climate_challenges"),
            Column::Challenges(FieldKey::SchoolClimate)
        );
        assert_eq!(column_for("\u{feff}id"), Column::Id);
        assert_eq!(column_for("mathematicsScore"), Column::Ignored);
    }

    #[test]
    fn csv_rows_become_school_records() {
        let data = "id,name,principal,students,notes,mathematics_score,mathematics_challenges,region\n\
                    7,Hillside,Avi,320,ok,2,0;3;x,north\n";
        let schools = read_schools_csv(reader(data)).unwrap();
        assert_eq!(schools.len(), 1);
        let school = &schools[0];
        assert_eq!(school.id, 7);
        assert_eq!(school.name, "Hillside");
        assert_eq!(school.student_count(), 320);
        assert_eq!(school.score(FieldKey::Mathematics).get(), Some(2));
        let picks: Vec<usize> = school.selected_challenges(FieldKey::Mathematics).collect();
        assert_eq!(picks, vec![0, 3]);
    }

    #[test]
    fn malformed_cells_degrade_instead_of_failing() {
        let data = "id,name,students,science_score\nabc,Brookside,lots,seven\n";
        let schools = read_schools_csv(reader(data)).unwrap();
        assert_eq!(schools[0].student_count(), 0);
        assert!(!schools[0].score(FieldKey::Science).is_valid());
    }

    #[test]
    fn missing_ids_continue_after_the_highest() {
        let data = "id,name\n4,A\n,B\n2,C\n,D\n";
        let ids: Vec<u32> = read_schools_csv(reader(data))
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![4, 5, 2, 6]);
    }

    #[test]
    fn json_records_survive_bad_keys_and_indices() {
        let data = r#"[
            {"id": 1, "name": "A", "challenges": {"mathematics": [0, -1]}},
            {"id": 2, "name": "B", "scores": {"mathScore": 2, "mathematics": 4}}
        ]"#;
        let schools = read_schools_json(data.as_bytes()).unwrap();
        assert_eq!(schools.len(), 2);
        assert_eq!(
            schools[0].selected_challenges(FieldKey::Mathematics).collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(schools[1].score(FieldKey::Mathematics).get(), Some(4));
    }

    #[test]
    fn json_files_round_trip_through_disk() {
        let path = std::env::temp_dir().join(format!("issues-{}.json", uuid::Uuid::new_v4()));
        let names = vec!["first".to_string(), "second".to_string()];
        write_json_file(&path, &names).unwrap();
        let back: Vec<String> = read_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back, names);
    }

    #[test]
    fn missing_json_file_names_the_path() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
        let err = read_json_file::<Vec<String>>(&path).unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn id_assignment_stops_at_the_largest_id() {
        let data = "id,name\n4294967295,A\n,B\n";
        let ids: Vec<u32> = read_schools_csv(reader(data))
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![u32::MAX, u32::MAX]);
    }

    #[test]
    fn written_sample_reads_back_unchanged() {
        let schools = sample_schools();
        let mut buffer = Vec::new();
        write_schools_csv(&mut buffer, &schools).unwrap();
        let parsed = read_schools_csv(csv::Reader::from_reader(buffer.as_slice())).unwrap();
        assert_eq!(parsed.len(), schools.len());
        for (left, right) in parsed.iter().zip(&schools) {
            assert_eq!(left.id, right.id);
            assert_eq!(left.challenges, right.challenges);
            for key in FieldKey::ALL {
                assert_eq!(left.score(key), right.score(key));
            }
        }
    }

    #[test]
    fn sample_ids_are_unique() {
        let schools = sample_schools();
        let ids: HashSet<u32> = schools.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), schools.len());
    }
}
