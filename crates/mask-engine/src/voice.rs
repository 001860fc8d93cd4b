//! Call-flow XML for the voice webhook.
//!
//! A matched call is transferred to the counterparty with the caller's
//! number masked. Anything else hears a fixed apology.

use std::borrow::Cow;

use mask_core::Address;

use crate::router::RouteOutcome;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Spoken to callers the router could not match.
pub const UNMATCHED_APOLOGY: &str =
    "Sorry, we cannot identify your transaction. Make sure you call in from the number you registered.";

pub const APOLOGY_LANGUAGE: &str = "en-GB";
pub const APOLOGY_VOICE: &str = "female";

/// Instruction returned to the telephony provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFlow {
    /// Bridge the call to `destination`, masking the caller.
    Transfer { destination: Address },
    /// Read `text` aloud and hang up.
    Say {
        text: String,
        language: &'static str,
        voice: &'static str,
    },
}

impl CallFlow {
    /// Call flow for a routing outcome.
    pub fn from_outcome(outcome: &RouteOutcome) -> Self {
        match outcome.destination() {
            Some(destination) => Self::Transfer {
                destination: destination.clone(),
            },
            None => Self::apology(),
        }
    }

    pub fn apology() -> Self {
        Self::Say {
            text: UNMATCHED_APOLOGY.to_string(),
            language: APOLOGY_LANGUAGE,
            voice: APOLOGY_VOICE,
        }
    }

    pub fn to_xml(&self) -> String {
        match self {
            Self::Transfer { destination } => format!(
                r#"{XML_DECLARATION}<Transfer destination="{}" mask="true" />"#,
                escape(destination.as_str())
            ),
            Self::Say {
                text,
                language,
                voice,
            } => format!(
                r#"{XML_DECLARATION}<Say language="{}" voice="{}">{}</Say>"#,
                escape(language),
                escape(voice),
                escape(text)
            ),
        }
    }
}

fn escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
