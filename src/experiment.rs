use quick_xml::escape::escape;
use std::fmt::Write;

use crate::algorithm::AlgorithmInstance;
use crate::error::SdmError;
use crate::validate::validate;

const LM_NAMESPACE: &str = "http://lifemapper.org";
const SCHEMA_LOCATION: &str = "http://lifemapper.org /schemas/serviceRequest.xsd";

/// Algorithm to run: either a configured instance or just a code, in which
/// case the service applies its own defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmChoice {
    Instance(AlgorithmInstance),
    Code(String),
}

impl AlgorithmChoice {
    pub fn code(&self) -> &str {
        match self {
            AlgorithmChoice::Instance(a) => a.code(),
            AlgorithmChoice::Code(c) => c,
        }
    }
}

impl From<AlgorithmInstance> for AlgorithmChoice {
    fn from(a: AlgorithmInstance) -> Self {
        AlgorithmChoice::Instance(a)
    }
}

impl From<&str> for AlgorithmChoice {
    fn from(code: &str) -> Self {
        AlgorithmChoice::Code(code.to_string())
    }
}

impl From<String> for AlgorithmChoice {
    fn from(code: String) -> Self {
        AlgorithmChoice::Code(code)
    }
}

/// A new SDM experiment: one model, optionally projected onto other scenarios.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRequest {
    pub algorithm: AlgorithmChoice,
    pub model_scenario: i64,
    pub occurrence_set_id: i64,
    pub projection_scenarios: Vec<i64>,
    pub model_mask: Option<i64>,
    pub projection_mask: Option<i64>,
    /// Notified by the service when the experiment completes.
    pub email: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ExperimentRequest {
    pub fn new(
        algorithm: impl Into<AlgorithmChoice>,
        model_scenario: i64,
        occurrence_set_id: i64,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            model_scenario,
            occurrence_set_id,
            projection_scenarios: Vec::new(),
            model_mask: None,
            projection_mask: None,
            email: None,
            name: None,
            description: None,
        }
    }

    pub fn with_projection_scenarios(mut self, scenarios: impl IntoIterator<Item = i64>) -> Self {
        self.projection_scenarios = scenarios.into_iter().collect();
        self
    }

    pub fn with_model_mask(mut self, layer_id: i64) -> Self {
        self.model_mask = Some(layer_id);
        self
    }

    pub fn with_projection_mask(mut self, layer_id: i64) -> Self {
        self.projection_mask = Some(layer_id);
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the algorithm parameters against the requested projections.
    pub fn validate(&self) -> Result<(), SdmError> {
        match &self.algorithm {
            AlgorithmChoice::Instance(a) => validate(a.parameters(), &self.projection_scenarios),
            AlgorithmChoice::Code(_) => Ok(()),
        }
    }

    /// Renders the `lm:request` document posted to the experiments endpoint.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) -> std::fmt::Result {
        writeln!(
            out,
            r#"<lm:request xmlns:lm="{}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="{}">"#,
            LM_NAMESPACE, SCHEMA_LOCATION
        )?;
        writeln!(out, "  <lm:experiment>")?;
        writeln!(out, "    <lm:algorithm>")?;
        writeln!(
            out,
            "      <lm:algorithmCode>{}</lm:algorithmCode>",
            escape(self.algorithm.code())
        )?;

        if let AlgorithmChoice::Instance(a) = &self.algorithm {
            let set: Vec<_> = a
                .parameters()
                .iter()
                .filter_map(|p| p.value().map(|v| (p.name(), v)))
                .collect();
            if !set.is_empty() {
                writeln!(out, "      <lm:parameters>")?;
                for (name, value) in set {
                    writeln!(out, "        <lm:{0}>{1}</lm:{0}>", name, escape(value))?;
                }
                writeln!(out, "      </lm:parameters>")?;
            }
        }

        writeln!(out, "    </lm:algorithm>")?;
        writeln!(
            out,
            "    <lm:occurrenceSetId>{}</lm:occurrenceSetId>",
            self.occurrence_set_id
        )?;
        writeln!(out, "    <lm:modelScenario>{}</lm:modelScenario>", self.model_scenario)?;
        if let Some(mask) = self.model_mask {
            writeln!(out, "    <lm:modelMask>{}</lm:modelMask>", mask)?;
        }
        if let Some(email) = &self.email {
            writeln!(out, "    <lm:email>{}</lm:email>", escape(email))?;
        }
        if let Some(name) = &self.name {
            writeln!(out, "    <lm:name>{}</lm:name>", escape(name))?;
        }
        if let Some(description) = &self.description {
            writeln!(out, "    <lm:description>{}</lm:description>", escape(description))?;
        }
        for scn in &self.projection_scenarios {
            writeln!(out, "    <lm:projectionScenario>{}</lm:projectionScenario>", scn)?;
        }
        if let Some(mask) = self.projection_mask {
            writeln!(out, "    <lm:projectionMask>{}</lm:projectionMask>", mask)?;
        }
        writeln!(out, "  </lm:experiment>")?;
        write!(out, "</lm:request>")
    }
}
