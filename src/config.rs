use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, Duration, UtcOffset};

use crate::bookings::time::Boundary;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Offset of the room's local wall clock.
    pub utc_offset: UtcOffset,
    pub cancel_lead: Duration,
    pub boundary: Boundary,
    /// Lower-cased emails granted the admin role on first sign-in.
    pub admin_emails: Vec<String>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            utc_offset: UtcOffset::UTC,
            cancel_lead: Duration::HOUR,
            boundary: Boundary::Closed,
            admin_emails: Vec::new(),
        }
    }
}

impl BookingConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub identity: IdentityConfig,
    pub booking: BookingConfig,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

pub(crate) fn parse_offset(value: &str) -> anyhow::Result<UtcOffset> {
    UtcOffset::parse(
        value.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid UTC offset {value:?}"))
}

pub(crate) fn parse_emails(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let identity = IdentityConfig {
            secret: std::env::var("IDP_JWT_SECRET").context("IDP_JWT_SECRET")?,
            issuer: var_or("IDP_ISSUER", "roombook-idp"),
            audience: var_or("IDP_AUDIENCE", "roombook"),
        };
        let booking = BookingConfig {
            utc_offset: parse_offset(&var_or("BOOKING_UTC_OFFSET", "+00:00"))?,
            cancel_lead: Duration::minutes(
                var_or("BOOKING_CANCEL_LEAD_MINUTES", "60")
                    .parse::<i64>()
                    .context("BOOKING_CANCEL_LEAD_MINUTES")?,
            ),
            boundary: var_or("BOOKING_BOUNDARY", "closed").parse()?,
            admin_emails: parse_emails(&var_or("BOOKING_ADMIN_EMAILS", "")),
        };
        Ok(Self {
            database_url,
            identity,
            booking,
        })
    }
}
