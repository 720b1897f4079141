//! CSV export of a lead collection.
//!
//! Text columns are always quoted, numeric columns never are, so an absent
//! rating is an empty field while an absent phone is `""`. Quoting follows
//! RFC 4180: embedded quotes are doubled, commas and line breaks stay inside
//! the quotes.
use crate::errors::AppError;
use crate::models::Lead;
use chrono::NaiveDate;

pub const HEADER: [&str; 7] = [
    "Name", "Address", "Phone", "Website", "Rating", "Reviews", "Category",
];

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Encodes `leads` as a CSV document, header first, one row per lead in
/// collection order. Rows are separated by `\n` without a trailing newline.
///
/// A lead with a blank name never comes out of the collector; seeing one here
/// is reported as [`AppError::Encoding`] instead of writing a broken row.
pub fn encode(leads: &[Lead]) -> Result<String, AppError> {
    let mut rows = Vec::with_capacity(leads.len() + 1);
    rows.push(HEADER.join(","));

    for (index, lead) in leads.iter().enumerate() {
        if lead.name.trim().is_empty() {
            return Err(AppError::Encoding(format!(
                "lead at row {} has no name",
                index + 1
            )));
        }

        let fields = [
            quote(Some(&lead.name)),
            quote(lead.address.as_deref()),
            quote(lead.phone.as_deref()),
            quote(lead.website.as_deref()),
            lead.rating.map(|r| r.to_string()).unwrap_or_default(),
            lead.reviews_count.map(|c| c.to_string()).unwrap_or_default(),
            quote(lead.category.as_deref()),
        ];
        rows.push(fields.join(","));
    }

    Ok(rows.join("\n"))
}

fn quote(value: Option<&str>) -> String {
    format!("\"{}\"", value.unwrap_or("").replace('"', "\"\""))
}

/// Parses a document produced by [`encode`] back into leads.
///
/// Empty fields become `None`; coordinates are not part of the export and stay
/// unset.
pub fn decode(document: &str) -> Result<Vec<Lead>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(document.as_bytes());

    let headers = reader.headers()?;
    if headers.iter().ne(HEADER.iter().copied()) {
        return Err(AppError::BadRequest(format!(
            "unexpected CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut leads = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = |i: usize| {
            record
                .get(i)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let rating = text(4)
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("invalid rating: {}", e)))?;
        let reviews_count = text(5)
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("invalid review count: {}", e)))?;

        leads.push(Lead {
            name: text(0).unwrap_or_default(),
            address: text(1),
            phone: text(2),
            website: text(3),
            rating,
            reviews_count,
            category: text(6),
            latitude: None,
            longitude: None,
        });
    }

    Ok(leads)
}

/// Download name for an export made on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("leads_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_for_empty_collection() {
        assert_eq!(
            encode(&[]).unwrap(),
            "Name,Address,Phone,Website,Rating,Reviews,Category"
        );
    }

    #[test]
    fn test_row_layout() {
        let leads = vec![Lead {
            name: "Joe's Cafe".to_string(),
            address: Some("1 Main St".to_string()),
            phone: Some("555-1111".to_string()),
            rating: Some(4.5),
            reviews_count: Some(120),
            ..Default::default()
        }];

        let csv = encode(&leads).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, r#""Joe's Cafe","1 Main St","555-1111","",4.5,120,"""#);
    }

    #[test]
    fn test_absent_numbers_are_empty_not_zero() {
        let leads = vec![Lead {
            name: "No Rating".to_string(),
            ..Default::default()
        }];

        let csv = encode(&leads).unwrap();
        assert!(csv.ends_with(r#""No Rating","","","",,,"""#));
    }

    #[test]
    fn test_quotes_commas_and_newlines_are_escaped() {
        let leads = vec![Lead {
            name: r#"The "Best", Pizza"#.to_string(),
            address: Some("Suite 4\nBuilding B".to_string()),
            ..Default::default()
        }];

        let csv = encode(&leads).unwrap();
        assert!(csv.contains(r#""The ""Best"", Pizza""#));
        assert_eq!(decode(&csv).unwrap(), leads);
    }

    #[test]
    fn test_blank_name_fails_loudly() {
        let leads = vec![Lead {
            name: "  ".to_string(),
            ..Default::default()
        }];
        assert!(matches!(encode(&leads), Err(AppError::Encoding(_))));
    }

    #[test]
    fn test_decode_rejects_foreign_header() {
        let result = decode("name,phone\n\"A\",\"1\"");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date), "leads_2024-03-09.csv");
    }
}
