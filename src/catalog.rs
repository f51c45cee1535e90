use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashSet;
use std::sync::Arc;

use crate::algorithm::{
    AlgorithmInstance, AlgorithmParameterSpec, AlgorithmSpec, ParamOption, ValueType,
    normalize_whitespace,
};
use crate::error::SdmError;

const EMBEDDED_CATALOG: &str = include_str!("../data/algorithms.xml");

#[derive(Debug, serde::Deserialize)]
struct CatalogXml {
    #[serde(default, rename = "algorithm")]
    algorithms: Vec<AlgorithmXml>,
}

#[derive(Debug, serde::Deserialize)]
struct AlgorithmXml {
    #[serde(rename = "@code")]
    code: String,
    #[serde(default, rename = "@name")]
    name: Option<String>,
    #[serde(default, rename = "@version")]
    version: Option<String>,
    #[serde(default)]
    authors: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    software: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: ParametersXml,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ParametersXml {
    #[serde(default, rename = "parameter")]
    items: Vec<ParameterXml>,
}

#[derive(Debug, serde::Deserialize)]
struct ParameterXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(default, rename = "@displayName")]
    display_name: Option<String>,
    #[serde(default, rename = "@default")]
    default: Option<String>,
    #[serde(default, rename = "@min")]
    min: Option<String>,
    #[serde(default, rename = "@max")]
    max: Option<String>,
    #[serde(default, rename = "@allowProjectionsIfValue")]
    allow_projections_if_value: Option<String>,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    options: Option<OptionsXml>,
}

#[derive(Debug, serde::Deserialize)]
struct OptionsXml {
    #[serde(default, rename = "option")]
    items: Vec<OptionXml>,
}

#[derive(Debug, serde::Deserialize)]
struct OptionXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

/// The set of algorithms offered by the service.
///
/// Specs are immutable once loaded; callers work on [`AlgorithmInstance`]
/// copies obtained from [`AlgorithmCatalog::get_algorithm_instance`].
#[derive(Debug, Clone, Default)]
pub struct AlgorithmCatalog {
    specs: Vec<Arc<AlgorithmSpec>>,
}

impl AlgorithmCatalog {
    /// Builds a catalog from already constructed specs.
    ///
    /// Codes must be unique ignoring case, as must parameter names within an
    /// algorithm.
    pub fn new(specs: Vec<AlgorithmSpec>) -> Result<Self> {
        let mut codes = HashSet::new();
        for spec in &specs {
            if !codes.insert(spec.code.to_ascii_lowercase()) {
                bail!("duplicate algorithm code [{}] in catalog", spec.code);
            }
            let mut names = HashSet::new();
            for p in &spec.parameters {
                // names become element names in the submission body
                if !is_element_name(&p.name) {
                    bail!(
                        "parameter name [{}] of algorithm {} is not a valid XML name",
                        p.name,
                        spec.code
                    );
                }
                if !names.insert(p.name.to_ascii_lowercase()) {
                    bail!(
                        "duplicate parameter [{}] for algorithm {}",
                        p.name,
                        spec.code
                    );
                }
            }
        }

        Ok(Self {
            specs: specs.into_iter().map(Arc::new).collect(),
        })
    }

    /// The catalog compiled into the crate, used when the service's own
    /// catalog is not fetched.
    pub fn embedded() -> Result<Self> {
        Self::from_xml(EMBEDDED_CATALOG).context("embedded algorithm catalog is invalid")
    }

    /// Parses an `<algorithms>` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc: CatalogXml =
            quick_xml::de::from_str(xml).context("failed to parse algorithm catalog XML")?;

        let specs = doc
            .algorithms
            .into_iter()
            .map(algorithm_from_xml)
            .collect::<Result<Vec<_>>>()?;

        let catalog = Self::new(specs)?;
        log::info!("loaded algorithm catalog with {} algorithm(s)", catalog.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// All algorithm codes, as stored.
    pub fn list_algorithm_codes(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.code.as_str()).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &AlgorithmSpec> {
        self.specs.iter().map(|s| s.as_ref())
    }

    pub fn get_spec(&self, code: &str) -> Result<&AlgorithmSpec, SdmError> {
        self.find(code).map(|s| s.as_ref())
    }

    /// Returns a fresh instance of the algorithm with every parameter set to
    /// its default value.
    pub fn get_algorithm_instance(&self, code: &str) -> Result<AlgorithmInstance, SdmError> {
        self.find(code)
            .map(|spec| AlgorithmInstance::new(Arc::clone(spec)))
    }

    fn find(&self, code: &str) -> Result<&Arc<AlgorithmSpec>, SdmError> {
        self.specs
            .iter()
            .find(|s| s.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| SdmError::UnknownAlgorithm {
                code: code.to_string(),
            })
    }
}

fn algorithm_from_xml(a: AlgorithmXml) -> Result<AlgorithmSpec> {
    let code = a.code.trim().to_string();
    if code.is_empty() {
        bail!("algorithm without a code in catalog");
    }

    let parameters = a
        .parameters
        .items
        .into_iter()
        .map(|p| parameter_from_xml(p).map(Arc::new))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid parameter definition for algorithm {}", code))?;

    Ok(AlgorithmSpec {
        code,
        name: a.name,
        authors: a.authors.map(|s| s.trim().to_string()),
        description: a.description.as_deref().map(normalize_whitespace),
        link: a.link.map(|s| s.trim().to_string()),
        software: a.software.map(|s| s.trim().to_string()),
        version: a.version,
        parameters,
    })
}

fn parameter_from_xml(p: ParameterXml) -> Result<AlgorithmParameterSpec> {
    let value_type: ValueType = p
        .kind
        .parse()
        .map_err(|e| anyhow!("parameter {}: {}", p.name, e))?;

    Ok(AlgorithmParameterSpec {
        name: p.name,
        display_name: p.display_name,
        value_type,
        default_value: p.default,
        min_value: p.min,
        max_value: p.max,
        options: p.options.map(|o| {
            o.items
                .into_iter()
                .map(|opt| ParamOption {
                    label: opt.name,
                    value: opt.value,
                })
                .collect()
        }),
        allow_projections_if_value: p.allow_projections_if_value,
        documentation: p.doc.as_deref().map(normalize_whitespace),
    })
}

// An XML NCName restricted to ASCII.
fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"<?xml version="1.0"?>
<algorithms>
   <algorithm code="ENVDIST" name="Environmental Distance" version="0.5">
      <authors>Mauro E. S. Munoz</authors>
      <description>
         Generic algorithm based on environmental
         dissimilarity metrics &amp; more.
      </description>
      <parameters>
         <parameter name="DistanceType" displayName="Distance Type"
                    min="1" max="4" type="Integer" default="1">
            <doc>
               Metric used to calculate distances:
               1=Euclidean
            </doc>
            <options>
               <option name="Euclidean" value="1" />
               <option name="Mahalanobis" value="2" />
            </options>
         </parameter>
         <parameter name="MaxDistance" min="0" max="1" type="Float" default="0.1" />
      </parameters>
   </algorithm>
   <algorithm code="NOPARAMS" />
</algorithms>
"#;

    #[test]
    fn parses_metadata_and_parameters() {
        let catalog = AlgorithmCatalog::from_xml(SMALL).unwrap();
        assert_eq!(catalog.list_algorithm_codes(), vec!["ENVDIST", "NOPARAMS"]);

        let spec = catalog.get_spec("envdist").unwrap();
        assert_eq!(spec.name.as_deref(), Some("Environmental Distance"));
        assert_eq!(spec.version.as_deref(), Some("0.5"));
        assert_eq!(spec.link, None);
        assert_eq!(
            spec.description.as_deref(),
            Some("Generic algorithm based on environmental dissimilarity metrics & more.")
        );

        let dist = spec.parameter("distancetype").unwrap();
        assert_eq!(dist.value_type, ValueType::Integer);
        assert_eq!(dist.min_value.as_deref(), Some("1"));
        assert_eq!(dist.max_value.as_deref(), Some("4"));
        assert_eq!(
            dist.documentation.as_deref(),
            Some("Metric used to calculate distances: 1=Euclidean")
        );
        let options = dist.options.as_ref().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].label, "Mahalanobis");
        assert_eq!(options[1].value, "2");

        let max = spec.parameter("MaxDistance").unwrap();
        assert_eq!(max.display_name, None);
        assert_eq!(max.options, None);
        assert_eq!(max.documentation, None);
        assert_eq!(max.allow_projections_if_value, None);

        assert!(catalog.get_spec("NOPARAMS").unwrap().parameters.is_empty());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let xml = r#"<algorithms><algorithm code="X"><parameters>
            <parameter name="p" type="Double" /></parameters></algorithm></algorithms>"#;
        let err = AlgorithmCatalog::from_xml(xml).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown parameter type"));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let xml = r#"<algorithms><algorithm code="GARP" /><algorithm code="garp" /></algorithms>"#;
        assert!(AlgorithmCatalog::from_xml(xml).is_err());
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let spec = AlgorithmSpec::new("A")
            .with_parameter(AlgorithmParameterSpec::new("Seed", ValueType::Integer))
            .with_parameter(AlgorithmParameterSpec::new("seed", ValueType::Integer));
        assert!(AlgorithmCatalog::new(vec![spec]).is_err());
    }

    #[test]
    fn parameter_names_must_be_element_names() {
        for bad in ["bad name", "1x", "lm:x", "a<b", ""] {
            let xml = format!(
                r#"<algorithms><algorithm code="A"><parameters>
                   <parameter name="{}" type="Integer" default="1"/>
                   </parameters></algorithm></algorithms>"#,
                quick_xml::escape::escape(bad)
            );
            let err = AlgorithmCatalog::from_xml(&xml).unwrap_err();
            assert!(format!("{err:#}").contains("not a valid XML name"), "{bad}: {err:#}");
        }
        for good in ["Seed", "_x", "max-iter.2"] {
            assert!(is_element_name(good), "{good}");
        }
    }

    #[test]
    fn unknown_code_fails() {
        let catalog = AlgorithmCatalog::from_xml(SMALL).unwrap();
        assert_eq!(
            catalog.get_algorithm_instance("NOT_A_REAL_CODE").unwrap_err(),
            SdmError::UnknownAlgorithm {
                code: "NOT_A_REAL_CODE".into()
            }
        );
    }

    #[test]
    fn embedded_catalog_loads() {
        let catalog = AlgorithmCatalog::embedded().unwrap();
        assert_eq!(catalog.len(), 11);
        let maxent = catalog.get_spec("ATT_MAXENT").unwrap();
        assert_eq!(maxent.parameters.len(), 46);
        assert_eq!(maxent.software.as_deref(), Some("Maxent"));
        assert!(maxent.description.as_deref().unwrap().contains("AT&T Labs-Research"));
        let replicates = maxent.parameter("replicates").unwrap();
        assert_eq!(replicates.allow_projections_if_value.as_deref(), Some("1"));
    }
}
