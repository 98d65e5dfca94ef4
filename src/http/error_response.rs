//! Synthetic error responses written to clients.

use std::fmt::Display;

/// Build the 503 written to a client when the remote cannot be dialed or a
/// filter fails critically. The body is `{"message":"<reason>: <error>"}`.
pub fn error_response(reason: &str, err: &dyn Display) -> Vec<u8> {
    let message = serde_json::json!({ "message": format!("{reason}: {err}") }).to_string();

    format!(
        "HTTP/1.1 503 Service Unavailable\r\n\
         Content-Type: application/json\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        message.len(),
        message
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_json_with_message() {
        let raw = error_response("Failed to apply filter", &"JSON: expected value at line 1 \"x\"");
        let text = String::from_utf8(raw).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();

        assert!(head.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(head.contains("Content-Type: application/json"));
        assert!(head.contains("Connection: close"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));

        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed["message"],
            "Failed to apply filter: JSON: expected value at line 1 \"x\""
        );
    }
}
