use crate::types::Entry;
use chrono::FixedOffset;

/// Render the outbound text for one entry:
///
/// ```text
/// <title> (<YYYY-MM-DD HH:MM>)
/// <link>
/// [<feed name>]
/// ```
pub fn format_entry(entry: &Entry, feed_name: &str, offset: &FixedOffset) -> String {
    format!(
        "{} ({})\n{}\n[{}]",
        entry.title,
        entry.published.with_timezone(offset).format("%Y-%m-%d %H:%M"),
        entry.link,
        feed_name
    )
}
