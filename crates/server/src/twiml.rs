//! TwiML rendering
//!
//! Serializes call-flow verbs into the markup the telephony platform
//! executes. Every `<Say>` uses the configured voice and locale.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use voice_tutor_agent::{CallResponse, Verb};

/// Voice attributes applied to spoken text
#[derive(Debug, Clone)]
pub struct SayVoice {
    pub voice: String,
    pub language: String,
}

/// Rendered TwiML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Twiml(pub String);

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml")], self.0).into_response()
    }
}

/// Render a call response as a `<Response>` document
pub fn render(response: &CallResponse, voice: &SayVoice) -> Twiml {
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    for verb in &response.verbs {
        render_verb(verb, voice, &mut out);
    }
    out.push_str("</Response>");
    Twiml(out)
}

fn render_verb(verb: &Verb, voice: &SayVoice, out: &mut String) {
    match verb {
        Verb::Say(text) => {
            out.push_str(&format!(
                r#"<Say voice="{}" language="{}">{}</Say>"#,
                escape(&voice.voice),
                escape(&voice.language),
                escape(text)
            ));
        }
        Verb::Play(url) => {
            out.push_str(&format!("<Play>{}</Play>", escape(url)));
        }
        Verb::Gather {
            num_digits,
            timeout_secs,
            action,
            prompt,
        } => {
            out.push_str(&format!(
                r#"<Gather numDigits="{}" action="{}" method="POST" timeout="{}">"#,
                num_digits,
                escape(action),
                timeout_secs
            ));
            for inner in prompt {
                render_verb(inner, voice, out);
            }
            out.push_str("</Gather>");
        }
        Verb::Record {
            max_length_secs,
            timeout_secs,
            play_beep,
            action,
        } => {
            out.push_str(&format!(
                r#"<Record action="{}" method="POST" maxLength="{}" timeout="{}" playBeep="{}" transcribe="false"/>"#,
                escape(action),
                max_length_secs,
                timeout_secs,
                play_beep
            ));
        }
        Verb::Redirect(url) => {
            out.push_str(&format!(r#"<Redirect method="POST">{}</Redirect>"#, escape(url)));
        }
        Verb::Hangup => out.push_str("<Hangup/>"),
    }
}

/// Escape text for XML content and attribute values
pub fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
