//! Prompt text spoken by the agent
//!
//! Wording matters here: these strings are synthesized to speech, so they
//! stay short, avoid abbreviations the TTS might mangle, and always end
//! with the question the caller should answer.

pub const INSURANCE_PROMPT: &str =
    "To get started, could you please tell me your insurance provider name and your member ID number?";

pub const CHIEF_COMPLAINT_PROMPT: &str =
    "What's the main reason you'd like to see a doctor today?";

pub const DEMOGRAPHICS_PROMPT: &str =
    "I need to verify your address. Could you please provide your complete street address including city, state, and zip code?";

pub const NOT_UNDERSTOOD: &str =
    "I'm sorry, I didn't quite catch that. Could you please repeat?";

/// Escalation wording when the insurance prompt would repeat
pub const INSURANCE_ESCALATION: &str =
    "I understand you may be having trouble. Let me explain what I need. \
     I need the name of your insurance company - like Kaiser Permanente, \
     Blue Cross Blue Shield, Aetna, Cigna, UnitedHealthcare, or another provider. \
     Can you tell me which insurance company you have?";

/// Generic escalation when any other prompt would repeat
pub const GENERIC_ESCALATION: &str =
    "I understand this might be confusing. Let me know if you need any clarification, \
     or say 'help' if you'd like me to explain what information I need.";
