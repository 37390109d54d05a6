use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

/// Renders the success payload: a bare JSON array of floats.
///
/// Serialization can refuse the vector (non-finite values); callers degrade
/// to [`render_error`] in that case so the one-line contract still holds.
pub fn render_embedding(vector: &[f32]) -> Result<String, serde_json::Error> {
    serde_json::to_string(vector)
}

/// Renders the failure payload: `{"error": "<message>"}`.
pub fn render_error(message: &str) -> String {
    serde_json::to_string(&ErrorPayload { error: message })
        .unwrap_or_else(|_| r#"{"error":"serialization failure"}"#.to_string())
}

/// Writes one rendered payload as a single newline-terminated line.
///
/// The payload and the trailing newline go out in one `write_all` call, so a
/// failed write never leaves a partial JSON value on stdout.
pub fn write_line<W: Write>(writer: &mut W, payload: &str) -> io::Result<()> {
    let mut line = String::with_capacity(payload.len() + 1);
    line.push_str(payload);
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_renders_as_bare_array() {
        let rendered = render_embedding(&[0.25, -0.5, 1.0]).unwrap();
        assert_eq!(rendered, "[0.25,-0.5,1.0]");
    }

    #[test]
    fn empty_vector_renders_as_empty_array() {
        assert_eq!(render_embedding(&[]).unwrap(), "[]");
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(render_embedding(&[f32::NAN]).is_err());
        assert!(render_embedding(&[f32::INFINITY]).is_err());
    }

    #[test]
    fn error_payload_shape() {
        assert_eq!(render_error("no_input"), r#"{"error":"no_input"}"#);
    }

    #[test]
    fn error_message_is_escaped() {
        let rendered = render_error("bad \"quote\"\nand newline");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            parsed.get("error").and_then(|v| v.as_str()),
            Some("bad \"quote\"\nand newline")
        );
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn write_line_emits_exactly_one_line() {
        let mut out = Vec::new();
        write_line(&mut out, r#"{"error":"no_input"}"#).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written, "{\"error\":\"no_input\"}\n");
        assert_eq!(written.matches('\n').count(), 1);
    }
}
