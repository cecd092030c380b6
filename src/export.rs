use std::io::Write;

use chrono::NaiveDate;

use crate::models::SchoolRecord;
use crate::taxonomy::Taxonomy;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn default_export_name(date: NaiveDate) -> String {
    format!("school_mapping_{}.csv", date.format("%Y_%m_%d"))
}

/// Writes the mapping table as spreadsheet-friendly CSV: labels instead of
/// keys, and challenge phrases instead of indices.
pub fn write_mapping_csv<W: Write>(
    mut writer: W,
    supervisor: &str,
    schools: &[SchoolRecord],
    taxonomy: &Taxonomy,
) -> anyhow::Result<()> {
    writer.write_all(UTF8_BOM)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    let mut headers = vec![
        "supervisor".to_string(),
        "school name".to_string(),
        "principal".to_string(),
        "students".to_string(),
    ];
    headers.extend(taxonomy.fields().map(|field| field.label.to_string()));
    headers.push("notes".to_string());
    headers.extend(taxonomy.fields().map(|field| format!("{} challenges", field.label)));
    csv_writer.write_record(&headers)?;

    for school in schools {
        let mut row = vec![
            supervisor.to_string(),
            school.name.clone(),
            school.principal.clone(),
            school.students.clone(),
        ];
        row.extend(taxonomy.fields().map(|field| school.score(field.key).to_string()));
        row.push(school.notes.clone());
        row.extend(taxonomy.fields().map(|field| {
            school
                .selected_challenges(field.key)
                .filter_map(|index| taxonomy.challenge(field.key, index))
                .collect::<Vec<_>>()
                .join("; ")
        }));
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}
