//! Call-flow vocabulary
//!
//! A call has no server-side session. Each webhook response is a list of
//! [`Verb`]s for the telephony platform plus the state the call moves to;
//! the level travels in the callback URLs built by [`CallbackRoutes`].

use serde::{Deserialize, Serialize};
use voice_tutor_core::AcademicLevel;

/// Position of a call in the tutoring flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Inbound call, welcome played
    Entry,
    /// Waiting for the level digit
    LevelSelect,
    /// Waiting for the caller's question
    Recording,
    /// Turn pipeline running
    Processing,
    /// Answer playing, continue digit gathered next
    Answered,
    /// Waiting for the continue/end digit
    ContinueLoop,
    /// Call hung up
    Ended,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended)
    }
}

/// One instruction for the telephony platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Say(String),
    Play(String),
    /// Collect keypad digits while playing `prompt`
    Gather {
        num_digits: u8,
        timeout_secs: u32,
        action: String,
        prompt: Vec<Verb>,
    },
    Record {
        max_length_secs: u32,
        timeout_secs: u32,
        play_beep: bool,
        action: String,
    },
    Redirect(String),
    Hangup,
}

/// Response to one webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    pub verbs: Vec<Verb>,
    /// State the call is in once the platform has run `verbs`
    pub state: CallState,
}

impl CallResponse {
    pub fn new(state: CallState) -> Self {
        Self {
            verbs: Vec::new(),
            state,
        }
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn gather(mut self, num_digits: u8, timeout_secs: u32, action: String, prompt: Vec<Verb>) -> Self {
        self.verbs.push(Verb::Gather {
            num_digits,
            timeout_secs,
            action,
            prompt,
        });
        self
    }

    pub fn record(mut self, max_length_secs: u32, timeout_secs: u32, play_beep: bool, action: String) -> Self {
        self.verbs.push(Verb::Record {
            max_length_secs,
            timeout_secs,
            play_beep,
            action,
        });
        self
    }

    pub fn redirect(mut self, url: String) -> Self {
        self.verbs.push(Verb::Redirect(url));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Redirect target, if any
    pub fn redirect_target(&self) -> Option<&str> {
        self.verbs.iter().find_map(|v| match v {
            Verb::Redirect(url) => Some(url.as_str()),
            _ => None,
        })
    }

    pub fn ends_call(&self) -> bool {
        self.verbs.last() == Some(&Verb::Hangup)
    }

    /// Everything spoken, in order, including gather prompts
    pub fn spoken(&self) -> Vec<&str> {
        fn collect<'a>(verbs: &'a [Verb], out: &mut Vec<&'a str>) {
            for verb in verbs {
                match verb {
                    Verb::Say(text) => out.push(text),
                    Verb::Gather { prompt, .. } => collect(prompt, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.verbs, &mut out);
        out
    }
}

/// Callback URLs; each one carries the level forward
#[derive(Debug, Clone)]
pub struct CallbackRoutes {
    prefix: String,
}

impl CallbackRoutes {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn voice(&self) -> String {
        format!("{}/voice", self.prefix)
    }

    pub fn level_selected(&self) -> String {
        format!("{}/level-selected", self.prefix)
    }

    pub fn record(&self, level: AcademicLevel) -> String {
        format!("{}/record?level={}", self.prefix, level.code())
    }

    pub fn process(&self, level: AcademicLevel) -> String {
        format!("{}/process?level={}", self.prefix, level.code())
    }

    pub fn continue_choice(&self, level: AcademicLevel) -> String {
        format!("{}/continue?level={}", self.prefix, level.code())
    }

    /// Continue prompt after one invalid digit
    pub fn continue_retry(&self, level: AcademicLevel) -> String {
        format!("{}/continue?level={}&reprompt=1", self.prefix, level.code())
    }

    pub fn status(&self) -> String {
        format!("{}/status", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_carry_level() {
        let routes = CallbackRoutes::new("/api/twilio/");
        assert_eq!(routes.record(AcademicLevel::HigherSecondary), "/api/twilio/record?level=3");
        assert_eq!(routes.process(AcademicLevel::Arts), "/api/twilio/process?level=7");
        assert_eq!(routes.continue_choice(AcademicLevel::Primary), "/api/twilio/continue?level=1");
        assert_eq!(
            routes.continue_retry(AcademicLevel::Primary),
            "/api/twilio/continue?level=1&reprompt=1"
        );
        assert_eq!(routes.level_selected(), "/api/twilio/level-selected");
    }

    #[test]
    fn test_response_helpers() {
        let response = CallResponse::new(CallState::Answered)
            .say("Here is your answer.")
            .play("https://x/audio/a.mp3")
            .gather(1, 5, "/c".into(), vec![Verb::Say("Press 1".into())])
            .say("Goodbye")
            .hangup();

        assert!(response.ends_call());
        assert_eq!(response.spoken(), vec!["Here is your answer.", "Press 1", "Goodbye"]);
        assert!(response.redirect_target().is_none());
        assert!(!response.state.is_terminal());
    }
}
