//! Flux query builders and the CSV reader for query responses

use postsaga_domain::Window;
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::write::POST_MEASUREMENT;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CsvError {
    #[error("Malformed CSV on line {0}")]
    Malformed(usize),
    #[error("Column '{0}' missing from result")]
    MissingColumn(&'static str),
    #[error("Invalid {column} value '{value}'")]
    InvalidValue { column: &'static str, value: String },
}

fn flux_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '$' => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn post_events(bucket: &str, window: &Window) -> String {
    format!(
        "from(bucket: {bucket})\n  \
         |> range(start: -{window})\n  \
         |> filter(fn: (r) => r[\"_measurement\"] == \"{POST_MEASUREMENT}\")\n",
        bucket = flux_string(bucket),
        window = window,
    )
}

pub(crate) fn top_upvoted(bucket: &str, window: &Window, n: usize) -> String {
    format!(
        "{}  |> filter(fn: (r) => r[\"action\"] == \"upvote\")\n  \
         |> filter(fn: (r) => r[\"_field\"] == \"count\")\n  \
         |> group(columns: [\"post_id\"])\n  \
         |> sum()\n  \
         |> keep(columns: [\"post_id\", \"_value\"])\n  \
         |> group()\n  \
         |> top(n: {}, columns: [\"_value\"])\n",
        post_events(bucket, window),
        n
    )
}

pub(crate) fn recent_post_ids(bucket: &str, window: &Window) -> String {
    format!(
        "{}  |> keep(columns: [\"post_id\"])\n  \
         |> group()\n  \
         |> distinct(column: \"post_id\")\n",
        post_events(bucket, window)
    )
}

pub(crate) fn last_activity(bucket: &str, window: &Window, post_id: &str) -> String {
    format!(
        "{}  |> filter(fn: (r) => r[\"post_id\"] == {})\n  \
         |> group()\n  \
         |> max(column: \"_time\")\n  \
         |> keep(columns: [\"_time\"])\n",
        post_events(bucket, window),
        flux_string(post_id)
    )
}

/// Rows of a Flux CSV response keyed by column name.
/// Multiple tables are separated by blank lines, each with its own header.
pub(crate) fn parse_csv(body: &str) -> Result<Vec<HashMap<String, String>>, CsvError> {
    let mut rows = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for (index, line) in body.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            header = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let fields = split_csv_line(line).ok_or(CsvError::Malformed(index + 1))?;
        match &header {
            None => header = Some(fields),
            Some(columns) => {
                if fields.len() != columns.len() {
                    return Err(CsvError::Malformed(index + 1));
                }
                rows.push(columns.iter().cloned().zip(fields).collect());
            }
        }
    }

    Ok(rows)
}

fn split_csv_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            if !closed {
                return None;
            }
            fields.push(field);
            match chars.next() {
                Some(',') => {}
                None => break,
                Some(_) => return None,
            }
        } else {
            let mut ended = true;
            for c in chars.by_ref() {
                if c == ',' {
                    ended = false;
                    break;
                }
                field.push(c);
            }
            fields.push(field);
            if ended {
                break;
            }
        }
    }

    Some(fields)
}

fn column<'a>(row: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str, CsvError> {
    row.get(name)
        .map(String::as_str)
        .ok_or(CsvError::MissingColumn(name))
}

pub(crate) fn ranked_counts(
    rows: &[HashMap<String, String>],
) -> Result<Vec<(String, i64)>, CsvError> {
    rows.iter()
        .map(|row| {
            let post_id = column(row, "post_id")?;
            let value = column(row, "_value")?;
            let count = value
                .parse::<i64>()
                .or_else(|_| value.parse::<f64>().map(|v| v as i64))
                .map_err(|_| CsvError::InvalidValue {
                    column: "_value",
                    value: value.to_string(),
                })?;
            Ok((post_id.to_string(), count))
        })
        .collect()
}

/// `distinct()` reports values in `_value`
pub(crate) fn distinct_values(rows: &[HashMap<String, String>]) -> Result<Vec<String>, CsvError> {
    rows.iter()
        .map(|row| {
            column(row, "_value")
                .or_else(|_| column(row, "post_id"))
                .map(str::to_string)
        })
        .filter(|value| !matches!(value, Ok(v) if v.is_empty()))
        .collect()
}

pub(crate) fn last_time(
    rows: &[HashMap<String, String>],
) -> Result<Option<OffsetDateTime>, CsvError> {
    let mut latest = None;
    for row in rows {
        let value = column(row, "_time")?;
        let at = OffsetDateTime::parse(value, &Rfc3339).map_err(|_| CsvError::InvalidValue {
            column: "_time",
            value: value.to_string(),
        })?;
        latest = latest.max(Some(at));
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_query_shape() {
        let flux = top_upvoted("bucket1", &Window::days(7), 3);

        assert!(flux.starts_with("from(bucket: \"bucket1\")"));
        assert!(flux.contains("range(start: -7d)"));
        assert!(flux.contains("r[\"action\"] == \"upvote\""));
        assert!(flux.contains("top(n: 3, columns: [\"_value\"])"));
    }

    #[test]
    fn test_post_id_is_quoted_in_query() {
        let flux = last_activity("bucket1", &Window::days(1), "a\"b");

        assert!(flux.contains("r[\"post_id\"] == \"a\\\"b\""));
        assert!(flux.contains("range(start: -1d)"));
        assert!(flux.contains("|> group()\n  |> max(column: \"_time\")"));
        assert!(!flux.contains("last()"));
    }

    #[test]
    fn test_parse_csv_multiple_tables() {
        let body = ",result,table,_value,post_id\r\n\
                    ,_result,0,5,b\r\n\
                    ,_result,0,3,a\r\n\
                    \r\n\
                    ,result,table,_value,post_id\r\n\
                    ,_result,1,1,\"c,d\"\r\n";

        let rows = parse_csv(body).unwrap();
        let ranked = ranked_counts(&rows).unwrap();

        assert_eq!(
            ranked,
            vec![
                ("b".to_string(), 5),
                ("a".to_string(), 3),
                ("c,d".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_parse_csv_skips_annotations() {
        let body = "#datatype,string,long,string\n\
                    ,result,table,_value\n\
                    ,_result,0,p1\n\
                    ,_result,0,p2\n";

        let rows = parse_csv(body).unwrap();

        assert_eq!(distinct_values(&rows).unwrap(), vec!["p1", "p2"]);
    }

    #[test]
    fn test_last_time() {
        let rows = parse_csv(",result,table,_time\n,_result,0,2024-05-01T12:00:00Z\n").unwrap();

        let at = last_time(&rows).unwrap().unwrap();
        assert_eq!(at.unix_timestamp(), 1_714_564_800);
        assert_eq!(last_time(&[]).unwrap(), None);
    }

    #[test]
    fn test_last_time_picks_newest_across_tables() {
        let body = ",result,table,_time,action\n\
                    ,_result,0,2024-05-02T09:00:00Z,upvote\n\
                    \n\
                    ,result,table,_time,action\n\
                    ,_result,1,2024-05-01T12:00:00Z,create\n";

        let rows = parse_csv(body).unwrap();

        let at = last_time(&rows).unwrap().unwrap();
        assert_eq!(at.unix_timestamp(), 1_714_640_400);
    }

    #[test]
    fn test_malformed_rows_rejected() {
        assert!(matches!(
            parse_csv(",a,b\n,\"unterminated,x\n"),
            Err(CsvError::Malformed(2))
        ));
        assert!(matches!(
            parse_csv(",a,b\n,1\n"),
            Err(CsvError::Malformed(2))
        ));
    }
}
