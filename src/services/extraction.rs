//! Pulls intake slot values out of free-text utterances.
//!
//! Extraction only ever fills slots that are still unset. A miss is not an
//! error: the slot stays empty and later turns get another chance.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ConversationState, IntakeData, Slot};

pub const CASH_PAY: &str = "cash_pay";

pub const ACCEPTED_INSURANCE: &[&str] = &[
    "aetna",
    "blue cross",
    "blue shield",
    "cigna",
    "delta dental",
    "guardian",
    "humana",
    "metlife",
    "united healthcare",
    "medicare",
    "medicaid",
];

const CASH_PAY_PHRASES: &[&str] = &[
    "no insurance",
    "cash",
    "self pay",
    "self-pay",
    "out of pocket",
    "paying myself",
    "don't have insurance",
];

pub const SERVICES: &[&str] = &[
    "cleaning",
    "checkup",
    "exam",
    "consultation",
    "x-ray",
    "screening",
    "filling",
    "cavity",
    "crown",
    "bridge",
    "root canal",
    "extraction",
    "implant",
    "whitening",
    "veneers",
    "bonding",
    "braces",
    "invisalign",
    "retainer",
    "emergency",
    "pain",
    "toothache",
    "broken tooth",
    "abscess",
    "infection",
];

const EMERGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "severe pain",
    "bleeding",
    "swelling",
    "broken tooth",
    "knocked out tooth",
    "knocked-out tooth",
    "accident",
    "trauma",
    "infection",
    "abscess",
    "can't breathe",
    "cannot breathe",
    "difficulty breathing",
    "trouble breathing",
    "can't swallow",
    "cannot swallow",
    "difficulty swallowing",
    "trouble swallowing",
    "can't eat",
    "cannot eat",
    "can't sleep",
    "cannot sleep",
    "unbearable",
    "excruciating",
];

const SAME_DAY_KEYWORDS: &[&str] = &[
    "today",
    "right now",
    "asap",
    "immediately",
    "as soon as possible",
];

const THIS_WEEK_PHRASES: &[&str] = &["this week", "within a week", "few days"];

const NEW_PATIENT_PHRASES: &[&str] = &[
    "new patient",
    "first time",
    "never been",
    "new here",
    "first visit",
];

const EXISTING_PATIENT_PHRASES: &[&str] = &[
    "existing",
    "current patient",
    "been here before",
    "regular patient",
    "returning",
    "come here before",
];

const WEEKDAYS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Words that disqualify a bare answer from being taken as a name.
const NAME_EXCLUDED: &[&str] = &["phone", "number", "birth", "insurance", "cash"];

/// Tokens that never appear in a person's name as spoken to a receptionist.
const NOT_NAME_TOKENS: &[&str] = &[
    "a", "an", "the", "for", "to", "is", "am", "i", "im", "me", "my", "you", "yes", "no", "not",
    "ok", "okay", "sure", "please", "thanks", "thank", "hello", "hi", "hey", "looking", "need",
    "want", "calling", "call", "have", "had", "new", "patient", "existing", "returning", "this",
    "that", "next", "week", "today", "tomorrow", "morning", "afternoon", "evening", "soon",
    "appointment", "cleaning", "checkup", "pain", "tooth", "teeth", "dental", "dentist",
    "emergency", "urgent", "in", "of", "with", "at", "on", "here", "speaking", "or", "and",
    "works", "work", "fine", "good", "great", "either", "any", "anytime", "whenever", "day",
    "days", "best", "be", "can", "could", "would", "it", "sounds", "just", "early", "late",
    "later", "weekend", "tonight", "now", "asap",
];

/// Longest name accepted, in whitespace-separated tokens.
const MAX_NAME_TOKENS: usize = 6;

/// Tokens that end a name run inside a longer sentence.
const NAME_TERMINATORS: &[&str] = &["and", "my", "i", "but", "so", "with", "from", "phone"];

static STRICT_NAME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:my name is|i am|i'm|this is|it's)\s+").unwrap());
static STRICT_NAME_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\b(?:here|speaking)\W*$").unwrap());
static LOOSE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:my name is|i am|this is|call me)\s+(\p{L}[\p{L}'.\- ]*)").unwrap()
});
static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\+\d{10,15}").unwrap(),
        Regex::new(r"\d{10,15}").unwrap(),
        Regex::new(r"\d{3}[-.\s]?\d{3}[-.\s]?\d{4}").unwrap(),
    ]
});
static DOB_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b").unwrap(),
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2}\b").unwrap(),
    ]
});
static TIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b\d{1,2}:\d{2}\s*(?:am|pm)\b").unwrap(),
        Regex::new(r"(?i)\b\d{1,2}\s*(?:am|pm)\b").unwrap(),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Emergency,
    SameDay,
    Urgent,
    Routine,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Emergency => "emergency",
            Urgency::SameDay => "same_day",
            Urgency::Urgent => "urgent",
            Urgency::Routine => "routine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "emergency" => Some(Urgency::Emergency),
            "same_day" => Some(Urgency::SameDay),
            "urgent" => Some(Urgency::Urgent),
            "routine" => Some(Urgency::Routine),
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

/// Tiered keyword scan: emergency beats same-day beats this-week.
pub fn classify_urgency(text: &str) -> Urgency {
    let text = normalize(text);
    if contains_any(&text, EMERGENCY_KEYWORDS) {
        Urgency::Emergency
    } else if contains_any(&text, SAME_DAY_KEYWORDS) {
        Urgency::SameDay
    } else if contains_any(&text, THIS_WEEK_PHRASES) {
        Urgency::Urgent
    } else {
        Urgency::Routine
    }
}

pub fn extract_patient_type(text: &str) -> Option<&'static str> {
    if classify_urgency(text) == Urgency::Emergency {
        return Some("emergency");
    }
    let text = normalize(text);
    if contains_any(&text, NEW_PATIENT_PHRASES) {
        Some("new")
    } else if contains_any(&text, EXISTING_PATIENT_PHRASES) {
        Some("existing")
    } else {
        None
    }
}

pub fn extract_service(text: &str) -> Option<&'static str> {
    let text = normalize(text);
    if let Some(service) = SERVICES.iter().find(|s| text.contains(*s)) {
        return Some(*service);
    }
    if text.contains("teeth cleaning") || text.contains("dental cleaning") {
        Some("cleaning")
    } else if text.contains("check up") || text.contains("check-up") {
        Some("checkup")
    } else if text.contains("hurt") || text.contains("ache") {
        Some("pain")
    } else {
        None
    }
}

/// Cash-pay phrasing wins over a named insurer.
pub fn extract_insurance(text: &str) -> Option<&'static str> {
    let text = normalize(text);
    if contains_any(&text, CASH_PAY_PHRASES) {
        return Some(CASH_PAY);
    }
    ACCEPTED_INSURANCE
        .iter()
        .find(|insurer| text.contains(*insurer))
        .copied()
}

pub fn is_accepted_insurance(insurance: &str) -> bool {
    insurance == CASH_PAY || ACCEPTED_INSURANCE.contains(&insurance.to_lowercase().as_str())
}

fn looks_like_name(tokens: &[&str]) -> bool {
    (2..=MAX_NAME_TOKENS).contains(&tokens.len())
        && tokens.iter().all(|t| {
            let lower = t.to_lowercase();
            let word = lower.trim_matches('.');
            t.chars().any(|c| c.is_alphabetic())
                && t.chars()
                    .all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'))
                && !NOT_NAME_TOKENS.contains(&word)
                && !WEEKDAYS.contains(&word)
        })
}

/// Name answer given while the name question is the active one.
///
/// The utterance is usually the answer to the scheduling question, so anything
/// that reads as a day, a time or an urgency signal is not a name.
pub fn extract_name_strict(utterance: &str) -> Option<String> {
    if contains_any(&normalize(utterance), NAME_EXCLUDED)
        || extract_preferred_date(utterance).is_some()
        || extract_preferred_time(utterance).is_some()
        || classify_urgency(utterance) != Urgency::Routine
    {
        return None;
    }
    let stripped = STRICT_NAME_PREFIX.replace(utterance.trim(), "");
    let stripped = STRICT_NAME_SUFFIX.replace(&stripped, "");
    let stripped = stripped.trim().trim_end_matches(&['.', ',', '!', '?'][..]).trim();
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    looks_like_name(&tokens).then(|| tokens.join(" "))
}

/// Self-introduction anywhere in the utterance ("... my name is Jane Doe and ...").
pub fn extract_name_loose(utterance: &str) -> Option<String> {
    let caps = LOOSE_NAME.captures(utterance)?;
    let tokens: Vec<&str> = caps[1]
        .split_whitespace()
        .take_while(|t| !NAME_TERMINATORS.contains(&t.to_lowercase().as_str()))
        .collect();
    looks_like_name(&tokens).then(|| tokens.join(" "))
}

/// Strips everything but digits, keeping a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

pub fn extract_phone(utterance: &str) -> Option<String> {
    PHONE_PATTERNS.iter().find_map(|pattern| {
        let found = pattern.find(utterance)?;
        let phone = normalize_phone(found.as_str());
        (phone.len() >= 10).then_some(phone)
    })
}

pub fn extract_dob(utterance: &str) -> Option<String> {
    DOB_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(utterance))
        .map(|m| m.as_str().to_string())
}

pub fn extract_preferred_date(utterance: &str) -> Option<String> {
    let text = normalize(utterance);
    WEEKDAYS.iter().find(|day| text.contains(*day)).map(|day| {
        let mut chars = day.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    })
}

pub fn extract_preferred_time(utterance: &str) -> Option<String> {
    let text = normalize(utterance);
    for (keyword, label) in [
        ("morning", "Morning"),
        ("afternoon", "Afternoon"),
        ("evening", "Evening"),
    ] {
        if text.contains(keyword) {
            return Some(label.to_string());
        }
    }
    TIME_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(utterance))
        .map(|m| m.as_str().to_uppercase())
}

/// Runs both extraction passes against `data` and returns the slots that were filled.
///
/// The state-targeted pass runs first and ends extraction for this utterance
/// when it stores a value; otherwise the general pass scans for every slot
/// still unset.
pub fn apply(data: &mut IntakeData, state: ConversationState, utterance: &str) -> Vec<Slot> {
    let targeted = match state {
        ConversationState::CollectName => Some((Slot::Name, extract_name_strict(utterance))),
        ConversationState::CollectPhone => Some((Slot::Phone, extract_phone(utterance))),
        ConversationState::CollectDob => Some((Slot::Dob, extract_dob(utterance))),
        ConversationState::CollectInsurance => Some((
            Slot::Insurance,
            extract_insurance(utterance).map(str::to_string),
        )),
        _ => None,
    };
    if let Some((slot, Some(value))) = targeted {
        if data.fill(slot, value) {
            return vec![slot];
        }
    }

    let mut filled = vec![];
    let mut try_fill = |data: &mut IntakeData, slot: Slot, extract: &dyn Fn() -> Option<String>| {
        if !data.is_set(slot) {
            if let Some(value) = extract() {
                if data.fill(slot, value) {
                    filled.push(slot);
                }
            }
        }
    };

    try_fill(data, Slot::Name, &|| extract_name_loose(utterance));
    try_fill(data, Slot::Phone, &|| extract_phone(utterance));
    try_fill(data, Slot::Dob, &|| extract_dob(utterance));
    try_fill(data, Slot::Insurance, &|| {
        extract_insurance(utterance).map(str::to_string)
    });
    try_fill(data, Slot::Service, &|| {
        extract_service(utterance).map(str::to_string)
    });
    try_fill(data, Slot::PatientType, &|| {
        extract_patient_type(utterance).map(str::to_string)
    });
    // Routine is the absence of a signal; it is recorded at the urgency question instead.
    try_fill(data, Slot::Urgency, &|| match classify_urgency(utterance) {
        Urgency::Routine => None,
        urgency => Some(urgency.as_str().to_string()),
    });
    try_fill(data, Slot::PreferredDate, &|| extract_preferred_date(utterance));
    try_fill(data, Slot::PreferredTime, &|| extract_preferred_time(utterance));

    filled
}
