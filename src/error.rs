use anyhow::anyhow;
use reqwest::StatusCode;
use thiserror::Error;

use crate::algorithm::ValueType;

/// Errors raised by catalog lookups and parameter validation.
///
/// None of these are transient: the caller has to pick a different code or
/// name, or fix a value, before trying again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SdmError {
    #[error("algorithm code [{code}] was not recognized")]
    UnknownAlgorithm { code: String },

    #[error("parameter '{parameter}' not found for algorithm {algorithm}")]
    UnknownParameter { algorithm: String, parameter: String },

    #[error(
        "parameter {display_name} ({name}) out of range, min: {}, max: {}, value: {value}",
        .min.as_deref().unwrap_or("none"),
        .max.as_deref().unwrap_or("none")
    )]
    ParameterOutOfRange {
        display_name: String,
        name: String,
        min: Option<String>,
        max: Option<String>,
        value: String,
    },

    #[error(
        "projections requested, but not allowed because the value of {display_name} ({value}) does not equal {required}"
    )]
    ProjectionsNotAllowed {
        display_name: String,
        value: String,
        required: String,
    },

    #[error("parameter {name}: [{value}] is not a valid {value_type}")]
    InvalidParameterValue {
        name: String,
        value: String,
        value_type: ValueType,
    },
}

pub(crate) fn format_service_error(status: StatusCode, url: &str, body: &str) -> anyhow::Error {
    let detail = summarize_body(body);

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "Lifemapper authentication/authorization failed (HTTP {}).\n- Check that the key in .lmclientrc is `<user>:<password>`\n- Anonymous clients cannot modify experiments owned by other users\n\nServer message: {}\nrequest: {}",
            status.as_u16(),
            detail,
            url
        );
    }

    if status == StatusCode::NOT_FOUND {
        return anyhow!(
            "Lifemapper endpoint not found (HTTP 404).\n- The service path may have changed, or your configured server URL is incorrect\n- Default server: http://lifemapper.org\n\nServer message: {}\nrequest: {}",
            detail,
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}",
        status.as_u16(),
        url,
        detail
    )
}

// Error pages are often full HTML documents; keep the message readable.
fn summarize_body(body: &str) -> String {
    const MAX: usize = 512;
    let text = body.trim();
    if text.is_empty() {
        return "(empty)".to_string();
    }
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_the_parameter() {
        let err = SdmError::ParameterOutOfRange {
            display_name: "Learning Rate".into(),
            name: "LearningRate".into(),
            min: Some("0".into()),
            max: None,
            value: "1.5".into(),
        };
        assert_eq!(
            err.to_string(),
            "parameter Learning Rate (LearningRate) out of range, min: 0, max: none, value: 1.5"
        );
    }

    #[test]
    fn projections_message_carries_required_value() {
        let err = SdmError::ProjectionsNotAllowed {
            display_name: "Number of Replicates".into(),
            value: "5".into(),
            required: "1".into(),
        };
        assert!(err.to_string().contains("(5) does not equal 1"));
    }

    #[test]
    fn auth_failures_get_remediation_hint() {
        let err = format_service_error(StatusCode::FORBIDDEN, "http://x/y", "denied");
        let msg = err.to_string();
        assert!(msg.contains("HTTP 403"));
        assert!(msg.contains("<user>:<password>"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let msg = format_service_error(StatusCode::BAD_REQUEST, "u", &body).to_string();
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 700);
    }
}
