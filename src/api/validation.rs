use actix_web::{
    error::{InternalError, JsonPayloadError},
    HttpResponse,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: serde_json::json!({ "message": message.into() }),
        }
    }
}

fn bad_request(response: ErrorResponse) -> actix_web::Error {
    InternalError::from_response("", HttpResponse::BadRequest().json(response)).into()
}

fn deserialize_message(err: &str) -> &'static str {
    if err.contains("EOF while parsing") {
        "Request body is empty or truncated. Expected JSON payload"
    } else if err.contains("invalid type") || err.contains("missing field") {
        "Invalid request data"
    } else {
        "Invalid JSON format"
    }
}

/// Creates a configured JsonConfig with standardized error handling for the entire project
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default()
        .error_handler(|err, _req| {
            let mut fields = serde_json::Map::new();

            match err {
                actix_web_validator::Error::Validate(validation_errors) => {
                    for (field, errors) in validation_errors.field_errors() {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| format!("Validation error in field: {}", field))
                            })
                            .collect();
                        fields.insert(
                            field.to_string(),
                            serde_json::json!({"errors": messages})
                        );
                    }

                    bad_request(ErrorResponse {
                        error: "Validation failed".to_string(),
                        fields: serde_json::Value::Object(fields),
                    })
                }
                actix_web_validator::Error::Deserialize(de_err) => bad_request(ErrorResponse::new(
                    "Request validation failed",
                    deserialize_message(&de_err.to_string()),
                )),
                actix_web_validator::Error::JsonPayloadError(payload_err) => match payload_err {
                    JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                        InternalError::from_response(
                            "",
                            HttpResponse::PayloadTooLarge()
                                .json(ErrorResponse::new("Payload too large", payload_err.to_string())),
                        )
                        .into()
                    }
                    JsonPayloadError::ContentType => bad_request(ErrorResponse::new(
                        "Request validation failed",
                        "Expected application/json",
                    )),
                    JsonPayloadError::Deserialize(json_err) => bad_request(ErrorResponse::new(
                        "Request validation failed",
                        deserialize_message(&json_err.to_string()),
                    )),
                    other => bad_request(ErrorResponse::new("Request validation failed", other.to_string())),
                },
                _ => bad_request(ErrorResponse::new("Validation failed", "Validation error")),
            }
        })
}

/// Query string extraction errors rendered like body validation errors
pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default().error_handler(|err, _req| {
        bad_request(ErrorResponse::new("Invalid query parameters", err.to_string()))
    })
}
