use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use url::Url;

const BRAND_NAME: &str = "biolink";

fn origin_label(app_origin: &str) -> String {
    Url::parse(app_origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| app_origin.to_string())
}

/// Escapes text that came from visitors before it goes into an HTML body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats integer cents as `12.34 BRL`.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}

pub fn primary_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{url}" style="display:inline-block;padding:12px 18px;background-color:#111827;color:#ffffff;text-decoration:none;border-radius:8px;font-weight:600;">{label}</a>"#
    )
}

pub fn magic_link_email(app_origin: &str, link: &str, ttl_minutes: i64) -> (String, String) {
    let subject = "Your login link".to_string();
    let headline = "Sign in to your page";
    let lead = "Use the button below to sign in. The link works once, in the browser you requested it from.";
    let button = primary_button(link, "Sign in");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">This link expires in {ttl_minutes} minutes.</p>"#
    );
    let html = wrap_email(
        app_origin,
        headline,
        lead,
        &body,
        "someone asked for a login link for this address",
        None,
    );
    (subject, html)
}

pub fn lead_notification_email(
    app_origin: &str,
    form_title: &str,
    values: &BTreeMap<String, String>,
) -> (String, String) {
    let title = escape_html(form_title);
    let subject = format!("New submission: {form_title}");
    let lead = format!("Someone filled in <strong>{title}</strong> on your page.");

    let rows: String = values
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<tr><td style="padding:4px 12px 4px 0;color:#6b7280;vertical-align:top;">{}</td><td style="padding:4px 0;color:#111827;">{}</td></tr>"#,
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();
    let body = format!(r#"<table style="border-collapse:collapse;font-size:14px;">{rows}</table>"#);

    let html = wrap_email(
        app_origin,
        "New lead",
        &lead,
        &body,
        "notifications are turned on for this form",
        Some("You can turn these emails off in the form settings."),
    );
    (subject, html)
}

pub fn payment_receipt_email(
    app_origin: &str,
    value_cents: i64,
    currency: &str,
    premium_until: Option<DateTime<Utc>>,
) -> (String, String) {
    let amount = format_money(value_cents, currency);
    let subject = format!("Payment received: {amount}");
    let lead = format!("We received your payment of <strong>{amount}</strong>. Thank you!");
    let body = match premium_until {
        Some(until) => format!(
            r#"<p style="margin:12px 0 0;color:#374151;">Premium is active until {}.</p>"#,
            until.format("%Y-%m-%d")
        ),
        None => String::new(),
    };
    let html = wrap_email(
        app_origin,
        "Payment confirmed",
        &lead,
        &body,
        "you have a subscription with us",
        None,
    );
    (subject, html)
}

pub fn wrap_email(
    app_origin: &str,
    headline: &str,
    lead: &str,
    body_html: &str,
    reason: &str,
    footer_note: Option<&str>,
) -> String {
    let origin = origin_label(app_origin);

    let footer_note = footer_note
        .map(|note| {
            format!(
                r#"<p style="margin:8px 0 0;color:#4b5563;font-size:13px;">{}</p>"#,
                note
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand} - {origin}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0;font-size:13px;color:#4b5563;">Why you got this email: {reason}.</p>
        {footer_note}
      </div>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
    )
}
