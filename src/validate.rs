//! Client-side checks run before an experiment is submitted.
//!
//! Each parameter is checked in declared order and the first violation is
//! returned. Values that are unset are not sent to the service and are skipped.

use std::cmp::Ordering;

use crate::algorithm::{AlgorithmInstance, ParameterInstance, ValueType};
use crate::error::SdmError;

/// Compares two raw values under a type's rule.
///
/// `Ok(None)` means the values differ but have no meaningful order. A failed
/// cast reports the raw text that could not be read.
type Comparator = fn(&str, &str) -> Result<Option<Ordering>, String>;

impl ValueType {
    fn comparator(self) -> Comparator {
        match self {
            ValueType::Integer => compare_integer,
            ValueType::Float => compare_float,
            ValueType::String => compare_string,
        }
    }
}

fn compare_integer(a: &str, b: &str) -> Result<Option<Ordering>, String> {
    let a = cast::<i64>(a)?;
    let b = cast::<i64>(b)?;
    Ok(Some(a.cmp(&b)))
}

fn compare_float(a: &str, b: &str) -> Result<Option<Ordering>, String> {
    let a = cast::<f64>(a)?;
    let b = cast::<f64>(b)?;
    Ok(a.partial_cmp(&b))
}

// Strings only know equality, so they never fail a range check.
fn compare_string(a: &str, b: &str) -> Result<Option<Ordering>, String> {
    Ok((a == b).then_some(Ordering::Equal))
}

fn cast<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.trim().parse::<T>().map_err(|_| raw.to_string())
}

/// Validates `parameters` against their bounds and against the requested
/// projection targets.
pub fn validate<T>(parameters: &[ParameterInstance], projections: &[T]) -> Result<(), SdmError> {
    for param in parameters {
        check_parameter(param, !projections.is_empty())?;
    }
    Ok(())
}

/// Same as [`validate`] over all parameters of an algorithm instance.
pub fn validate_algorithm<T>(
    algorithm: &AlgorithmInstance,
    projections: &[T],
) -> Result<(), SdmError> {
    validate(algorithm.parameters(), projections)
}

fn check_parameter(param: &ParameterInstance, has_projections: bool) -> Result<(), SdmError> {
    let Some(value) = param.value() else {
        return Ok(());
    };
    let spec = param.spec();
    let rule = spec.value_type.comparator();
    let compare = |a: &str, b: &str| {
        rule(a, b).map_err(|raw| SdmError::InvalidParameterValue {
            name: spec.name.clone(),
            value: raw,
            value_type: spec.value_type,
        })
    };

    if let Some(min) = spec.min_value.as_deref() {
        if compare(value, min)? == Some(Ordering::Less) {
            return Err(out_of_range(param, value));
        }
    }

    if let Some(max) = spec.max_value.as_deref() {
        if compare(value, max)? == Some(Ordering::Greater) {
            return Err(out_of_range(param, value));
        }
    }

    if let Some(required) = spec.allow_projections_if_value.as_deref() {
        if has_projections && compare(value, required)? != Some(Ordering::Equal) {
            return Err(SdmError::ProjectionsNotAllowed {
                display_name: param.label().to_string(),
                value: value.to_string(),
                required: required.to_string(),
            });
        }
    }

    Ok(())
}

fn out_of_range(param: &ParameterInstance, value: &str) -> SdmError {
    let spec = param.spec();
    SdmError::ParameterOutOfRange {
        display_name: param.label().to_string(),
        name: spec.name.clone(),
        min: spec.min_value.clone(),
        max: spec.max_value.clone(),
        value: value.to_string(),
    }
}
