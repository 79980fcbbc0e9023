//! Centralized constants for the voice tutor
//!
//! Provider endpoints, model ids and the bounds the call flow relies on.
//! Settings defaults read from here so the numbers live in one place.

/// Hosted provider endpoints
pub mod endpoints {
    /// Groq OpenAI-compatible API
    pub const GROQ_DEFAULT: &str = "https://api.groq.com/openai/v1";

    /// Deepgram API root (listen + speak)
    pub const DEEPGRAM_DEFAULT: &str = "https://api.deepgram.com/v1";
}

/// Model identifiers
pub mod models {
    pub const LLM_DEFAULT: &str = "llama-3.3-70b-versatile";
    pub const STT_DEFAULT: &str = "nova-2";
    pub const TTS_VOICE_DEFAULT: &str = "aura-2-thalia-en";
}

/// Generation parameters tuned for spoken answers
pub mod generation {
    pub const TEMPERATURE: f32 = 0.7;
    pub const TOP_P: f32 = 0.8;
    /// Keeps answers near the ~200 word target
    pub const MAX_TOKENS: usize = 512;
    /// Total attempts per strategy, including the first
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Backoff base; attempt `n` waits `n * base`
    pub const RETRY_BASE_DELAY_MS: u64 = 2_000;
}

/// Timeouts (in milliseconds unless noted)
///
/// Provider calls share one webhook response, which the telephony platform
/// abandons after about 15 s.
pub mod timeouts {
    pub const LLM_REQUEST_MS: u64 = 8_000;
    pub const STT_REQUEST_MS: u64 = 5_000;
    pub const TTS_REQUEST_MS: u64 = 5_000;
    /// Whole turn pipeline, in seconds
    pub const TURN_SECS: u64 = 12;
}

/// Call flow bounds
pub mod telephony {
    pub const VOICE: &str = "Polly.Aditi";
    pub const LOCALE: &str = "en-IN";
    pub const LEVEL_GATHER_TIMEOUT_SECS: u32 = 10;
    pub const CONTINUE_GATHER_TIMEOUT_SECS: u32 = 5;
    pub const MAX_RECORDING_SECS: u32 = 60;
    pub const SPEECH_START_TIMEOUT_SECS: u32 = 3;
}

/// History/context bounds
pub mod history {
    /// Turns fetched as generation context
    pub const CONTEXT_TURNS: usize = 5;
    /// Q/A pairs summarized in the system prompt
    pub const PROMPT_PAIRS: usize = 3;
    /// Prior answers are cut to this many characters when replayed
    pub const ANSWER_PREVIEW_CHARS: usize = 100;
    /// Default page size for the history API
    pub const API_PAGE_SIZE: usize = 10;
}

/// Synthesis bounds
pub mod synthesis {
    /// Provider-documented input limit
    pub const MAX_CHARS: usize = 2_000;
    pub const CLEANUP_MAX_AGE_HOURS: u64 = 24;
    pub const CLEANUP_INTERVAL_MINS: u64 = 60;
}
