//! Constants used throughout the CareCard core crate.
//!
//! Default endpoints, retry settings and fixed strings live here so that the binaries and the
//! library agree on them.

/// Text shown in place of a reply when the completion service returned nothing usable.
pub const NO_INFORMATION_PLACEHOLDER: &str = "No information found.";

/// Text stored in a chat placeholder when the completion request failed.
pub const CHAT_ERROR_REPLY: &str = "Error: Could not get an answer.";

/// Text stored in a chat placeholder while the completion request is in flight.
pub const CHAT_PENDING_REPLY: &str = "...";

/// Default base URL of the generative language API.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default completion model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Header carrying the completion service API key.
pub const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

/// Default Overpass interpreter endpoint used for hospital lookups.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Default OSRM routing server.
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Default hospital search radius in metres.
pub const DEFAULT_SEARCH_RADIUS_M: u32 = 5_000;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default factor applied to the delay after each retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Mean Earth radius in kilometres, used by the haversine distance.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// National ambulance number dialled by the emergency shortcuts.
pub const AMBULANCE_NUMBER: &str = "108";

/// WhatsApp number (with country code) for the ambulance service.
pub const AMBULANCE_WHATSAPP_NUMBER: &str = "91108";

/// Message pre-filled into SMS and WhatsApp emergency links.
pub const EMERGENCY_MESSAGE: &str = "I need urgent help";
