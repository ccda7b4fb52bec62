//! Alert message rendering (Telegram-flavoured HTML).

use crate::types::job::ScoredJob;

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render one job as an alert message.
pub fn render_job_alert(scored: &ScoredJob) -> String {
    let job = &scored.job;
    let stack = if job.stack.is_empty() {
        "N/A".to_string()
    } else {
        job.stack.join(", ")
    };

    format!(
        "🔥 <b>SignalForge Alert</b> (Score: {score})\n\
         \n\
         <b>Position:</b> {title}\n\
         <b>Company:</b> {company}\n\
         <b>Location:</b> {location}\n\
         <b>Stack:</b> {stack}\n\
         \n\
         <b>Apply:</b> {url}",
        score = scored.score,
        title = escape_html(&job.title),
        company = escape_html(&job.company),
        location = escape_html(&job.location),
        stack = escape_html(&stack),
        url = escape_html(&job.url),
    )
}
