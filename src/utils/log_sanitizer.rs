// ============================================================================
// Log Sanitization - card codes, search text and SAP messages in logs
// ============================================================================
//
// Everything that reaches a log line from a request (card codes, customer
// names, search strings) or from SAP (error messages) goes through here so a
// stray newline or ANSI sequence cannot forge log entries. Credentials and
// Service Layer session ids are never logged verbatim.
//
// ============================================================================

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length for logged values
const MAX_LOG_LENGTH: usize = 200;

static ANSI_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("static ANSI pattern is valid")
});

/// Sanitize a request- or SAP-provided value for logging.
///
/// Strips ANSI escapes and control characters, flattens newlines and tabs
/// to spaces and truncates to `MAX_LOG_LENGTH` characters.
///
/// ```
/// use field_portal::utils::log_sanitizer::sanitize_for_log;
///
/// assert_eq!(sanitize_for_log("BIC01563\nINFO forged"), "BIC01563 INFO forged");
/// ```
pub fn sanitize_for_log(input: &str) -> String {
    let no_ansi = ANSI_ESCAPE_REGEX.replace_all(input, "");

    let cleaned: String = no_ansi
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .filter(|c| !c.is_control())
        .collect();

    if cleaned.chars().count() > MAX_LOG_LENGTH {
        let truncated: String = cleaned.chars().take(MAX_LOG_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

pub fn sanitize_option_for_log(input: &Option<String>) -> String {
    match input {
        Some(value) => sanitize_for_log(value),
        None => "None".to_string(),
    }
}

/// Show only the first four characters of a Service Layer session id.
pub fn redact_session_id(session_id: &str) -> String {
    let prefix: String = session_id.chars().take(4).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_flattens_newlines() {
        let result = sanitize_for_log("ORC00196\r\n[INFO] posted");
        assert!(!result.contains('\n'));
        assert!(!result.contains('\r'));
        assert!(result.starts_with("ORC00196"));
    }

    #[test]
    fn test_sanitize_removes_ansi_escapes() {
        assert_eq!(sanitize_for_log("Multan\x1b[31m Zone\x1b[0m"), "Multan Zone");
    }

    #[test]
    fn test_sanitize_removes_control_chars() {
        assert_eq!(sanitize_for_log("FG\x00\x0700292"), "FG00292");
    }

    #[test]
    fn test_sanitize_truncates_long_values() {
        let result = sanitize_for_log(&"x".repeat(500));
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), MAX_LOG_LENGTH + 3);
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_for_log("ڈیرہ غازی خان"), "ڈیرہ غازی خان");
    }

    #[test]
    fn test_redactions() {
        assert_eq!(redact_session_id("abcdef-1234"), "abcd…");
        assert_eq!(sanitize_option_for_log(&None), "None");
    }
}
