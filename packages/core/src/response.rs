//! JSON response envelope produced by the service runtime.
//!
//! Every HTTP response body is an [`Envelope`]; the constructors here are
//! plain functions returning an [`ApiReply`] value that the transport layer
//! explicitly sends. Constructors never perform I/O themselves.

use serde::{Deserialize, Serialize};

/// JSON body shared by all success and error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// An HTTP status paired with the envelope body to send with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Envelope,
}

impl ApiReply {
    /// Builds an error reply. `code` is an application-level error code;
    /// the current wire format always uses 0.
    #[must_use]
    pub fn error(status: u16, code: u32, error: impl Into<String>) -> Self {
        Self {
            status,
            body: Envelope {
                success: false,
                message: None,
                error: Some(error.into()),
                code: Some(code),
                id: None,
            },
        }
    }

    /// Builds a success reply, optionally carrying the created/visited id.
    #[must_use]
    pub fn success(status: u16, message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            status,
            body: Envelope {
                success: true,
                message: Some(message.into()),
                error: None,
                code: None,
                id,
            },
        }
    }

    /// 200 reply for a freshly created record. `kind` is the handler's
    /// human-readable content name ("clip", "short link").
    #[must_use]
    pub fn created(kind: &str, id: &str) -> Self {
        Self::success(
            200,
            format!("Created {kind} with ID '{id}'"),
            Some(id.to_string()),
        )
    }

    #[must_use]
    pub fn missing_type() -> Self {
        Self::error(411, 0, "Content-Type header is missing!")
    }

    #[must_use]
    pub fn missing_length() -> Self {
        Self::error(411, 0, "Content-Length header is missing!")
    }

    #[must_use]
    pub fn content_type_not_allowed() -> Self {
        Self::error(400, 0, "Content-Type header is not allowed!")
    }

    #[must_use]
    pub fn data_too_large() -> Self {
        Self::error(413, 0, "Data too large!")
    }

    #[must_use]
    pub fn id_not_found(id: &str) -> Self {
        Self::error(404, 0, format!("The ID '{id}' was not found"))
    }

    #[must_use]
    pub fn server_error() -> Self {
        Self::error(500, 0, "Server error!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reply_shape() {
        let reply = ApiReply::missing_type();
        assert_eq!(reply.status, 411);
        let json = serde_json::to_value(&reply.body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], 0);
        assert_eq!(json["error"], "Content-Type header is missing!");
        assert!(json.get("message").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn success_reply_omits_error_fields() {
        let reply = ApiReply::created("clip", "aX9");
        assert_eq!(reply.status, 200);
        let json = serde_json::to_value(&reply.body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Created clip with ID 'aX9'");
        assert_eq!(json["id"], "aX9");
        assert!(json.get("error").is_none());
        assert!(json.get("code").is_none());
    }

    #[test]
    fn id_not_found_names_the_id() {
        let reply = ApiReply::id_not_found("zz");
        assert_eq!(reply.status, 404);
        assert_eq!(
            reply.body.error.as_deref(),
            Some("The ID 'zz' was not found")
        );
    }

    #[test]
    fn status_codes_match_wire_contract() {
        assert_eq!(ApiReply::missing_length().status, 411);
        assert_eq!(ApiReply::content_type_not_allowed().status, 400);
        assert_eq!(ApiReply::data_too_large().status, 413);
        assert_eq!(ApiReply::server_error().status, 500);
    }
}
