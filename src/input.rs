use std::io::Read;

use crate::EmbedError;

/// Reads the entirety of `reader` as UTF-8 text and strips surrounding
/// whitespace. Interior whitespace (newlines included) is preserved.
///
/// Whitespace-only input is reported as [`EmbedError::NoInput`] so the
/// embedder is never invoked for it.
pub fn read_input<R: Read>(reader: &mut R) -> Result<String, EmbedError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;

    let trimmed = buf.trim();
    if trimmed.is_empty() {
        return Err(EmbedError::NoInput);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_and_trims() {
        let mut input = Cursor::new("  hello world \n");
        assert_eq!(read_input(&mut input).unwrap(), "hello world");
    }

    #[test]
    fn preserves_interior_newlines() {
        let mut input = Cursor::new("line one\nline two\n");
        assert_eq!(read_input(&mut input).unwrap(), "line one\nline two");
    }

    #[test]
    fn empty_input_is_no_input() {
        let mut input = Cursor::new("");
        assert!(matches!(read_input(&mut input), Err(EmbedError::NoInput)));
    }

    #[test]
    fn whitespace_only_variants_are_no_input() {
        for ws in ["", " ", "   ", "\t", "\n", "\r\n", " \t \n ", "\t\t\t"] {
            let mut input = Cursor::new(ws);
            assert!(
                matches!(read_input(&mut input), Err(EmbedError::NoInput)),
                "should reject whitespace input {ws:?}",
            );
        }
    }

    #[test]
    fn unicode_passes_through() {
        let mut input = Cursor::new("Caf\u{00E9} \u{4E16}\u{754C} \u{1F30D}");
        assert_eq!(
            read_input(&mut input).unwrap(),
            "Caf\u{00E9} \u{4E16}\u{754C} \u{1F30D}"
        );
    }

    #[test]
    fn invalid_utf8_is_io_error() {
        let mut input = Cursor::new(vec![0xff, 0xfe, 0xfd]);
        assert!(matches!(read_input(&mut input), Err(EmbedError::Io(_))));
    }
}
