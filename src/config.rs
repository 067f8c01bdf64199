use std::env;

pub const DEFAULT_CLINIC_NAME: &str = "Bright Smile Dental Clinic";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub openrouter_api_key: String,
    pub openai_api_key: String,
    pub ai_model: String,
    pub ai_temperature: f32,
    pub ai_max_tokens: u32,
    pub ollama_url: String,
    pub ollama_model: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub staff_phone: String,
    pub google_sheet_id: String,
    pub google_sheets_token: String,
    pub google_sheet_range: String,
    pub clinic_name: String,
    pub session_ttl_secs: i64,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 8000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "frontdesk.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "groq".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            ai_model: env::var("AI_MODEL")
                .unwrap_or_else(|_| "llama-3.1-70b-versatile".to_string()),
            ai_temperature: parse_var("AI_TEMPERATURE", 0.7),
            ai_max_tokens: parse_var("AI_MAX_TOKENS", 1000),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            staff_phone: env::var("STAFF_PHONE").unwrap_or_default(),
            google_sheet_id: env::var("GOOGLE_SHEET_ID").unwrap_or_default(),
            google_sheets_token: env::var("GOOGLE_SHEETS_TOKEN").unwrap_or_default(),
            google_sheet_range: env::var("GOOGLE_SHEET_RANGE")
                .unwrap_or_else(|_| "Sheet1!A:J".to_string()),
            clinic_name: env::var("CLINIC_NAME")
                .unwrap_or_else(|_| DEFAULT_CLINIC_NAME.to_string()),
            session_ttl_secs: parse_var("SESSION_TTL_SECS", 1800),
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 60),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
