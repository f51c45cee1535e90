use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Filters for listing or counting experiments.
///
/// Times may be ISO 8601 (`2009-06-07T09:23:15Z`) or whatever other format
/// the server accepts; they are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentQuery {
    pub after_time: Option<String>,
    pub before_time: Option<String>,
    pub display_name: Option<String>,
    pub epsg_code: Option<u32>,
    pub algorithm_code: Option<String>,
    pub occurrence_set_id: Option<i64>,
    pub status: Option<i32>,
    /// Query the public archive instead of the user's own experiments.
    pub public: bool,
    pub page: u32,
    pub per_page: u32,
    /// Return complete experiment documents instead of list entries.
    pub full_objects: bool,
}

impl Default for ExperimentQuery {
    fn default() -> Self {
        Self {
            after_time: None,
            before_time: None,
            display_name: None,
            epsg_code: None,
            algorithm_code: None,
            occurrence_set_id: None,
            status: None,
            public: false,
            page: 0,
            per_page: 100,
            full_objects: false,
        }
    }
}

impl ExperimentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, time: impl Into<String>) -> Self {
        self.after_time = Some(time.into());
        self
    }

    pub fn before(mut self, time: impl Into<String>) -> Self {
        self.before_time = Some(time.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_epsg_code(mut self, code: u32) -> Self {
        self.epsg_code = Some(code);
        self
    }

    pub fn with_algorithm_code(mut self, code: impl Into<String>) -> Self {
        self.algorithm_code = Some(code.into());
        self
    }

    pub fn with_occurrence_set(mut self, id: i64) -> Self {
        self.occurrence_set_id = Some(id);
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn full_objects(mut self, full: bool) -> Self {
        self.full_objects = full;
        self
    }

    /// Query string parameters. Paging and `fullObjects` only apply to lists.
    pub(crate) fn to_params(&self, listing: bool) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let mut opt = |k: &'static str, v: Option<String>| {
            if let Some(v) = v {
                params.push((k, v));
            }
        };
        opt("afterTime", self.after_time.clone());
        opt("beforeTime", self.before_time.clone());
        opt("displayName", self.display_name.clone());
        opt("epsgCode", self.epsg_code.map(|c| c.to_string()));
        opt("algorithmCode", self.algorithm_code.clone());
        opt("occurrenceSetId", self.occurrence_set_id.map(|i| i.to_string()));
        opt("status", self.status.map(|s| s.to_string()));

        if listing {
            params.push(("page", self.page.to_string()));
            params.push(("perPage", self.per_page.to_string()));
        }
        params.push(("public", u8::from(self.public).to_string()));
        if listing {
            params.push(("fullObjects", u8::from(self.full_objects).to_string()));
        }
        params
    }
}

/// Reads the item count out of a count reply.
///
/// The count is published either as an `itemCount` attribute or as an
/// `itemCount` element, depending on the service version.
pub(crate) fn parse_item_count(xml: &str) -> Result<u64> {
    let mut reader = Reader::from_str(xml);
    let mut in_count = false;

    loop {
        match reader.read_event().context("failed to parse count XML")? {
            Event::Start(e) | Event::Empty(e) => {
                for attr in e.attributes() {
                    let attr = attr.context("bad attribute in count XML")?;
                    if attr.key.local_name().as_ref() == b"itemCount" {
                        return parse_count(&attr.unescape_value()?);
                    }
                }
                in_count = e.local_name().as_ref() == b"itemCount";
            }
            Event::Text(t) if in_count => return parse_count(&t.unescape()?),
            Event::End(_) => in_count = false,
            Event::Eof => bail!("no itemCount in count reply"),
            _ => {}
        }
    }
}

fn parse_count(raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("itemCount is not a number: [{}]", raw))
}

/// OGC map service URL for a layer published under `metadata_url`.
pub fn ogc_endpoint(metadata_url: &str, map_layer_name: &str) -> String {
    format!(
        "{}/ogc?layers={}",
        metadata_url.trim_end_matches('/'),
        map_layer_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_include_paging() {
        let q = ExperimentQuery::new()
            .after("2009-06-07T09:23:15Z")
            .with_algorithm_code("BIOCLIM")
            .with_epsg_code(4326)
            .page(2, 25)
            .public(true);
        assert_eq!(
            q.to_params(true),
            vec![
                ("afterTime", "2009-06-07T09:23:15Z".to_string()),
                ("epsgCode", "4326".to_string()),
                ("algorithmCode", "BIOCLIM".to_string()),
                ("page", "2".to_string()),
                ("perPage", "25".to_string()),
                ("public", "1".to_string()),
                ("fullObjects", "0".to_string()),
            ]
        );
    }

    #[test]
    fn count_params_skip_paging() {
        let q = ExperimentQuery::new().with_occurrence_set(77).with_status(300);
        assert_eq!(
            q.to_params(false),
            vec![
                ("occurrenceSetId", "77".to_string()),
                ("status", "300".to_string()),
                ("public", "0".to_string()),
            ]
        );
    }

    #[test]
    fn item_count_from_attribute_or_element() {
        let attr = r#"<lm:items xmlns:lm="http://lifemapper.org" lm:itemCount="12"/>"#;
        assert_eq!(parse_item_count(attr).unwrap(), 12);

        let elem = "<response><itemCount> 7 </itemCount></response>";
        assert_eq!(parse_item_count(elem).unwrap(), 7);
    }

    #[test]
    fn missing_item_count_is_an_error() {
        assert!(parse_item_count("<response><items/></response>").is_err());
        assert!(parse_item_count("<itemCount>many</itemCount>").is_err());
    }

    #[test]
    fn ogc_endpoint_appends_layer() {
        assert_eq!(
            ogc_endpoint("http://lifemapper.org/services/sdm/projections/9/", "prj_9"),
            "http://lifemapper.org/services/sdm/projections/9/ogc?layers=prj_9"
        );
    }
}
