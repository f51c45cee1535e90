use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SdmError;

/// Declared type of an algorithm parameter.
///
/// The type decides how values and bounds are compared during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::String => "String",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" => Ok(ValueType::Integer),
            "float" => Ok(ValueType::Float),
            "string" => Ok(ValueType::String),
            other => Err(format!("unknown parameter type [{}]", other)),
        }
    }
}

/// One entry of an enumerated parameter domain, e.g. `("Yes", "1")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamOption {
    pub label: String,
    pub value: String,
}

/// Immutable definition of a parameter, as published in the algorithm catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmParameterSpec {
    pub name: String,
    pub display_name: Option<String>,
    pub value_type: ValueType,
    pub default_value: Option<String>,
    /// Inclusive lower bound. Only meaningful for numeric types.
    pub min_value: Option<String>,
    /// Inclusive upper bound. Only meaningful for numeric types.
    pub max_value: Option<String>,
    /// Informational only; the validator does not restrict values to these.
    pub options: Option<Vec<ParamOption>>,
    /// When set, any other value forbids requesting projection scenarios.
    pub allow_projections_if_value: Option<String>,
    pub documentation: Option<String>,
}

impl AlgorithmParameterSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            value_type,
            default_value: None,
            min_value: None,
            max_value: None,
            options: None,
            allow_projections_if_value: None,
            documentation: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_default(mut self, value: impl ToString) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    pub fn with_min(mut self, value: impl ToString) -> Self {
        self.min_value = Some(value.to_string());
        self
    }

    pub fn with_max(mut self, value: impl ToString) -> Self {
        self.max_value = Some(value.to_string());
        self
    }

    pub fn with_options(mut self, options: Vec<ParamOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_allow_projections_if(mut self, value: impl ToString) -> Self {
        self.allow_projections_if_value = Some(value.to_string());
        self
    }

    pub fn with_documentation(mut self, doc: &str) -> Self {
        self.documentation = Some(normalize_whitespace(doc));
        self
    }

    /// Display name when the catalog provides one, otherwise the internal name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Immutable catalog entry for a modeling algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmSpec {
    pub code: String,
    pub name: Option<String>,
    pub authors: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub software: Option<String>,
    pub version: Option<String>,
    pub parameters: Vec<Arc<AlgorithmParameterSpec>>,
}

impl AlgorithmSpec {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            authors: None,
            description: None,
            link: None,
            software: None,
            version: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: AlgorithmParameterSpec) -> Self {
        self.parameters.push(Arc::new(parameter));
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&AlgorithmParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
    }
}

/// A parameter with a caller-owned value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInstance {
    spec: Arc<AlgorithmParameterSpec>,
    value: Option<String>,
}

impl ParameterInstance {
    pub fn new(spec: Arc<AlgorithmParameterSpec>) -> Self {
        let value = spec.default_value.clone();
        Self { spec, value }
    }

    pub fn spec(&self) -> &AlgorithmParameterSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn label(&self) -> &str {
        self.spec.label()
    }

    pub fn value_type(&self) -> ValueType {
        self.spec.value_type
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Overwrites the value. Bounds are only checked at submission time.
    pub fn set_value(&mut self, value: impl ToString) {
        self.value = Some(value.to_string());
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Restores the catalog default (or no value when there is none).
    pub fn reset(&mut self) {
        self.value = self.spec.default_value.clone();
    }
}

/// A mutable copy of an algorithm, created fresh for every submission.
///
/// Instances never share values: two instances made from the same
/// [`AlgorithmSpec`] can be changed independently.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmInstance {
    spec: Arc<AlgorithmSpec>,
    parameters: Vec<ParameterInstance>,
}

impl AlgorithmInstance {
    pub fn new(spec: Arc<AlgorithmSpec>) -> Self {
        let parameters = spec
            .parameters
            .iter()
            .map(|p| ParameterInstance::new(Arc::clone(p)))
            .collect();
        Self { spec, parameters }
    }

    pub fn spec(&self) -> &AlgorithmSpec {
        &self.spec
    }

    pub fn code(&self) -> &str {
        &self.spec.code
    }

    pub fn name(&self) -> Option<&str> {
        self.spec.name.as_deref()
    }

    pub fn authors(&self) -> Option<&str> {
        self.spec.authors.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.spec.description.as_deref()
    }

    pub fn link(&self) -> Option<&str> {
        self.spec.link.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.spec.version.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterInstance] {
        &self.parameters
    }

    /// Parameter names in declared order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name()).collect()
    }

    pub fn parameter(&self, name: &str) -> Result<&ParameterInstance, SdmError> {
        self.parameters
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| self.unknown_parameter(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut ParameterInstance, SdmError> {
        match self
            .parameters
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
        {
            Some(idx) => Ok(&mut self.parameters[idx]),
            None => Err(self.unknown_parameter(name)),
        }
    }

    /// Sets a parameter value without any range check.
    pub fn set_parameter(&mut self, name: &str, value: impl ToString) -> Result<(), SdmError> {
        self.parameter_mut(name)?.set_value(value);
        Ok(())
    }

    fn unknown_parameter(&self, name: &str) -> SdmError {
        SdmError::UnknownParameter {
            algorithm: self.spec.code.clone(),
            parameter: name.to_string(),
        }
    }
}

/// Drops line breaks and collapses runs of spaces, the way catalog text is
/// indented inside the XML document.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let joined: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let mut out = String::with_capacity(joined.len());
    let mut prev_space = false;
    for c in joined.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maxent_like() -> Arc<AlgorithmSpec> {
        Arc::new(
            AlgorithmSpec::new("ATT_MAXENT")
                .with_parameter(
                    AlgorithmParameterSpec::new("replicates", ValueType::Integer)
                        .with_display_name("Number of Replicates")
                        .with_min(1)
                        .with_default(1)
                        .with_allow_projections_if(1),
                )
                .with_parameter(
                    AlgorithmParameterSpec::new("outputformat", ValueType::Integer)
                        .with_min(0)
                        .with_max(2),
                ),
        )
    }

    #[test]
    fn value_type_parses_case_insensitively() {
        assert_eq!("integer".parse::<ValueType>(), Ok(ValueType::Integer));
        assert_eq!("FLOAT".parse::<ValueType>(), Ok(ValueType::Float));
        assert_eq!(" String ".parse::<ValueType>(), Ok(ValueType::String));
        assert!("double".parse::<ValueType>().is_err());
    }

    #[test]
    fn instance_seeds_values_from_defaults() {
        let inst = AlgorithmInstance::new(maxent_like());
        assert_eq!(inst.parameter("replicates").unwrap().value(), Some("1"));
        assert_eq!(inst.parameter("outputformat").unwrap().value(), None);
        assert_eq!(inst.parameter_names(), vec!["replicates", "outputformat"]);
    }

    #[test]
    fn set_parameter_is_case_insensitive_and_unchecked() {
        let mut inst = AlgorithmInstance::new(maxent_like());
        inst.set_parameter("OutputFormat", 99).unwrap();
        assert_eq!(inst.parameter("outputformat").unwrap().value(), Some("99"));

        let err = inst.set_parameter("nope", 1).unwrap_err();
        assert!(matches!(err, SdmError::UnknownParameter { ref parameter, .. } if parameter == "nope"));
    }

    #[test]
    fn reset_restores_default() {
        let mut inst = AlgorithmInstance::new(maxent_like());
        let p = inst.parameter_mut("replicates").unwrap();
        p.set_value("7");
        p.reset();
        assert_eq!(p.value(), Some("1"));
    }

    #[test]
    fn label_falls_back_to_name() {
        let spec = maxent_like();
        assert_eq!(spec.parameters[0].label(), "Number of Replicates");
        assert_eq!(spec.parameters[1].label(), "outputformat");
    }

    #[test]
    fn normalize_whitespace_joins_indented_lines() {
        let doc = "\n   Number of neurons in the hidden layer (additional layer to the \n   input and output layers).\n   ";
        assert_eq!(
            normalize_whitespace(doc),
            "Number of neurons in the hidden layer (additional layer to the input and output layers)."
        );
    }
}
