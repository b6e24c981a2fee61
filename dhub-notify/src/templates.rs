//! Email bodies for deadline notifications

use chrono::{DateTime, Utc};

/// Subject and HTML body for an approaching-deadline reminder.
pub fn deadline_reminder(
    user_name: &str,
    bureau: &str,
    deadline: DateTime<Utc>,
    days_remaining: i64,
) -> (String, String) {
    let subject = format!(
        "{} must respond to your dispute in {} day{}",
        bureau,
        days_remaining,
        if days_remaining == 1 { "" } else { "s" }
    );

    let body = format!(
        "<p>Hi {name},</p>\
         <p>{bureau} has until <strong>{date}</strong> to respond to your dispute letter \
         ({days} day{plural} remaining under the FCRA's 30-day investigation window).</p>\
         <p>Watch your mail for their response. When it arrives, upload it to your dashboard \
         and we'll read it for you.</p>\
         <p>&mdash; The DisputeHub team</p>",
        name = user_name,
        bureau = bureau,
        date = deadline.format("%B %-d, %Y"),
        days = days_remaining,
        plural = if days_remaining == 1 { "" } else { "s" },
    );

    (subject, body)
}

/// Subject and HTML body for a deadline that passed with no response.
pub fn deadline_overdue(user_name: &str, bureau: &str, deadline: DateTime<Utc>) -> (String, String) {
    let subject = format!("{}'s response deadline has passed", bureau);

    let body = format!(
        "<p>Hi {name},</p>\
         <p>{bureau}'s deadline to respond to your dispute was <strong>{date}</strong> and we \
         have no response on file.</p>\
         <p>Under FCRA Section 1681i, an item that cannot be verified within the investigation \
         window must be deleted. If nothing arrived in the mail, this is a strong basis for an \
         escalation letter or a CFPB complaint &mdash; both are available from your dashboard.</p>\
         <p>&mdash; The DisputeHub team</p>",
        name = user_name,
        bureau = bureau,
        date = deadline.format("%B %-d, %Y"),
    );

    (subject, body)
}
