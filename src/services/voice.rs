//! TwiML for the voice channel.

pub const PROCESS_PATH: &str = "/voice/process";
pub const INCOMING_PATH: &str = "/voice/incoming";
const VOICE: &str = "Polly.Joanna";
const LANGUAGE: &str = "en-US";

pub const REPROMPT: &str = "I didn't catch that. Could you please repeat?";

/// What the call should do after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceDirective {
    /// Speak and listen for the caller's next utterance.
    Gather { say: String },
    /// Speak a closing line and end the call.
    Hangup { say: String },
    /// Speak, then bridge the call to a staff line. Hangs up when no line is configured.
    Transfer { say: String, to: Option<String> },
}

impl VoiceDirective {
    pub fn to_twiml(&self, clinic: &str) -> String {
        match self {
            VoiceDirective::Gather { say } => gather(say, REPROMPT, PROCESS_PATH),
            VoiceDirective::Hangup { say } => document(&format!(
                "{}{}<Hangup/>",
                say_verb(say),
                say_verb(&format!("Thank you for calling {clinic}. Goodbye!")),
            )),
            VoiceDirective::Transfer { say, to: Some(number) } => document(&format!(
                "{}<Dial>{}</Dial>",
                say_verb(say),
                escape_xml(number)
            )),
            VoiceDirective::Transfer { say, to: None } => {
                document(&format!("{}<Hangup/>", say_verb(say)))
            }
        }
    }
}

/// Opening prompt for a new call.
pub fn greeting(clinic: &str) -> String {
    let say = format!(
        "Hello! Welcome to {clinic}. I'm Alex, your A I assistant. \
         Are you a new patient, or have you visited us before?"
    );
    gather(&say, "I didn't hear anything. Please try again.", INCOMING_PATH)
}

/// Listens for speech posted to the process path; on silence says `fallback` and redirects.
fn gather(say: &str, fallback: &str, redirect: &str) -> String {
    document(&format!(
        "<Gather input=\"speech\" action=\"{PROCESS_PATH}\" method=\"POST\" language=\"{LANGUAGE}\" \
         timeout=\"3\" speechTimeout=\"auto\">{}</Gather>\
         <Say>{}</Say>\
         <Redirect method=\"POST\">{redirect}</Redirect>",
        say_verb(say),
        escape_xml(fallback),
    ))
}

fn say_verb(text: &str) -> String {
    format!("<Say voice=\"{VOICE}\">{}</Say>", escape_xml(text))
}

fn document(body: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>{body}</Response>")
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
