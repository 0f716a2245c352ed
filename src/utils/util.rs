use chrono::{DateTime, SecondsFormat, Utc};

/// 当前 UTC 时间
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

/// RFC 3339 timestamp with millisecond precision, as used in response bodies.
pub fn timestamp() -> String {
    current_time().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `name (size MB)` pairs for log lines.
pub fn describe_files<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    files
        .into_iter()
        .map(|(name, size)| format!("{} ({} MB)", name, crate::models::bytes_to_mb(size)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_files() {
        let described = describe_files([("a.pdf", 1024 * 1024), ("b.docx", 0)]);
        assert_eq!(described, "a.pdf (1.0 MB), b.docx (0.0 MB)");
    }

    #[test]
    fn test_timestamp_is_utc() {
        assert!(timestamp().ends_with('Z'));
    }
}
