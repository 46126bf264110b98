pub const MODEL_API_KEY_ENV_NAME: &str = "EVENTSCOUT_MODEL_API_KEY";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

/// Location stored when the extractor names none.
pub const UNKNOWN_LOCATION: &str = "unbekannt";

/// Character budget for page text sent to the extraction model.
pub const MAX_EXTRACTION_CHARS: usize = 20_000;

/// Seeds whose combined page text is shorter than this are reported as failures.
pub const MIN_CONTENT_CHARS: usize = 100;

pub const EXTRACTION_TEMPERATURE: f32 = 0.3;

pub const NO_EVENTS_REPLY: &str =
    "No events in database. Please run a crawl ('eventscout crawl') first.";

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an event extractor. Extract ALL events from HTML content.

Respond ONLY in this format (no explanations):

EVENT_START
TITEL: [Event title]
DATUM: [DD.MM.YYYY or DD.MM.YYYY-DD.MM.YYYY for ranges]
ORT: [Location or "unbekannt"]
EVENT_END

Important:
- Extract ALL events
- For date ranges use start date
- Pay attention to Christmas markets, festivals, concerts"#;

pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are an event assistant for Bitterfeld-Wolfen and surrounding areas. \
Answer questions about events. Be friendly and precise. \
Always include title, date, location, and link.";
