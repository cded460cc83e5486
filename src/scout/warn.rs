fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub document: &'a str,
    pub location: &'a str,
    pub retry: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

pub fn format_line(event: &WarnEvent<'_>) -> String {
    format!(
        "DOCSCOUT_WARN code={} stage={} action={} document={} location={} retry={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.document),
        sanitize_value(event.location),
        sanitize_value(event.retry),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", format_line(&event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
        assert_eq!(sanitize_value("Guide  v2\n"), "Guide_v2");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn line_is_single_key_value_record() {
        let line = format_line(&WarnEvent {
            code: "E003_RETRIEVAL_FAILED",
            stage: "archive",
            action: "preserve-superseded",
            document: "eCTD Guide",
            location: "https://example.test/a.pdf",
            retry: "next-update",
            reason: "archive-failed",
            err: "status 404\nNot Found",
        });
        assert!(!line.contains('\n'));
        assert!(line.starts_with("DOCSCOUT_WARN code=E003_RETRIEVAL_FAILED"));
        assert!(line.contains("document=eCTD_Guide"));
        assert!(line.ends_with("err=status_404_Not_Found"));
    }
}
