use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub(crate) const MIN_QUERY_LEN: usize = 3;

/// An occurrence set matching a species hint query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Display name, may include author information.
    pub name: String,
    /// Occurrence set id.
    pub id: i64,
    pub num_points: i64,
    pub download_url: Option<String>,
    /// Genus and species only.
    pub binomial: Option<String>,
    pub num_models: i64,
}

// The service sometimes quotes numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    fn get(&self, field: &str) -> Result<i64> {
        match self {
            Number::Int(v) => Ok(*v),
            Number::Text(s) => s
                .trim()
                .parse()
                .with_context(|| format!("hint field {} is not an integer: [{}]", field, s)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HitJson {
    #[serde(default)]
    name: String,
    occurrence_set: Number,
    num_points: Number,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    binomial: Option<String>,
    num_models: Number,
}

// Older servers: {"columns": [[...]]}, current ones: {"hits": [...]}
#[derive(Debug, Deserialize)]
struct HintResponse {
    #[serde(default)]
    columns: Option<Vec<Vec<HitJson>>>,
    #[serde(default)]
    hits: Option<Vec<HitJson>>,
}

pub(crate) fn check_query(query: &str) -> Result<()> {
    if query.trim().chars().count() < MIN_QUERY_LEN {
        bail!(
            "hint query [{}] too short: provide at least {} characters",
            query,
            MIN_QUERY_LEN
        );
    }
    Ok(())
}

pub(crate) fn parse_hits(text: &str, max_returned: Option<usize>) -> Result<Vec<SearchHit>> {
    let resp: HintResponse =
        serde_json::from_str(text).context("failed to parse hint service JSON")?;

    let raw = match (resp.columns, resp.hits) {
        (Some(columns), _) => columns.into_iter().next().unwrap_or_default(),
        (None, Some(hits)) => hits,
        (None, None) => bail!("hint response has neither `hits` nor `columns`"),
    };

    let mut hits = raw
        .into_iter()
        .map(|h| {
            Ok(SearchHit {
                id: h.occurrence_set.get("occurrenceSet")?,
                num_points: h.num_points.get("numPoints")?,
                num_models: h.num_models.get("numModels")?,
                name: h.name,
                download_url: h.download_url,
                binomial: h.binomial,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(max) = max_returned {
        hits.truncate(max);
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_format() {
        let text = r#"{"hits": [
            {"name": "Ursus arctos Linnaeus", "occurrenceSet": 1234, "numPoints": 88,
             "downloadUrl": "http://lifemapper.org/shp/1234", "binomial": "Ursus arctos", "numModels": 3},
            {"name": "Ursus americanus", "occurrenceSet": "99", "numPoints": "12", "numModels": "0"}
        ]}"#;
        let hits = parse_hits(text, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1234);
        assert_eq!(hits[0].binomial.as_deref(), Some("Ursus arctos"));
        assert_eq!(hits[1].id, 99);
        assert_eq!(hits[1].num_points, 12);
        assert_eq!(hits[1].download_url, None);
    }

    #[test]
    fn parses_legacy_columns_format() {
        let text = r#"{"columns": [[
            {"name": "Puma concolor", "occurrenceSet": 5, "numPoints": 40, "numModels": 1}
        ]]}"#;
        let hits = parse_hits(text, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Puma concolor");
    }

    #[test]
    fn truncates_to_max_returned() {
        let text = r#"{"hits": [
            {"name": "a", "occurrenceSet": 1, "numPoints": 1, "numModels": 1},
            {"name": "b", "occurrenceSet": 2, "numPoints": 1, "numModels": 1},
            {"name": "c", "occurrenceSet": 3, "numPoints": 1, "numModels": 1}
        ]}"#;
        let hits = parse_hits(text, Some(2)).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn bad_numbers_are_errors() {
        let text = r#"{"hits": [{"name": "a", "occurrenceSet": "x", "numPoints": 1, "numModels": 1}]}"#;
        assert!(parse_hits(text, None).is_err());
    }

    #[test]
    fn short_queries_are_rejected() {
        assert!(check_query("ur").is_err());
        assert!(check_query("  ur ").is_err());
        assert!(check_query("urs").is_ok());
    }
}
