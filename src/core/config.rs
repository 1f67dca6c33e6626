use std::env;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASECAMP_API_URL: &str = "https://3.basecampapi.com";
pub const DEFAULT_USER_TOKEN_PARAM_PREFIX: &str = "/taskbot/user_tokens/";
pub const DEFAULT_DIRECTORY_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub processing_queue_url: String,
    pub slack_signing_secret: String,
    pub slack_bot_token: String,
    pub openai_api_key: String,
    pub openai_org_id: Option<String>,
    pub openai_model: Option<String>,
    pub directory_api_url: String,
    pub directory_api_key: Option<String>,
    pub directory_cache_ttl_secs: u64,
    pub basecamp_api_url: String,
    pub basecamp_user_agent: String,
    pub user_token_param_prefix: String,
    pub default_channel_id: Option<String>,
    pub allowed_user_ids: Vec<String>,
    pub timezone: chrono_tz::Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let directory_cache_ttl_secs = match env::var("DIRECTORY_CACHE_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("DIRECTORY_CACHE_TTL_SECS: {e}"))?,
            Err(_) => DEFAULT_DIRECTORY_CACHE_TTL_SECS,
        };

        let timezone = match env::var("BOT_TIMEZONE") {
            Ok(raw) => raw
                .trim()
                .parse::<chrono_tz::Tz>()
                .map_err(|e| format!("BOT_TIMEZONE: {e}"))?,
            Err(_) => chrono_tz::UTC,
        };

        Ok(Self {
            processing_queue_url: env::var("PROCESSING_QUEUE_URL")
                .map_err(|e| format!("PROCESSING_QUEUE_URL: {e}"))?,
            slack_signing_secret: env::var("SLACK_SIGNING_SECRET")
                .map_err(|e| format!("SLACK_SIGNING_SECRET: {e}"))?,
            slack_bot_token: env::var("SLACK_BOT_TOKEN")
                .map_err(|e| format!("SLACK_BOT_TOKEN: {e}"))?,
            openai_api_key: env::var("OPENAI_API_KEY")
                .map_err(|e| format!("OPENAI_API_KEY: {e}"))?,
            openai_org_id: env::var("OPENAI_ORG_ID").ok(),
            openai_model: env::var("OPENAI_MODEL").ok(),
            directory_api_url: env::var("DIRECTORY_API_URL")
                .map_err(|e| format!("DIRECTORY_API_URL: {e}"))?,
            directory_api_key: env::var("DIRECTORY_API_KEY").ok(),
            directory_cache_ttl_secs,
            basecamp_api_url: env::var("BASECAMP_API_URL")
                .unwrap_or_else(|_| DEFAULT_BASECAMP_API_URL.to_string()),
            basecamp_user_agent: env::var("BASECAMP_USER_AGENT")
                .unwrap_or_else(|_| "taskbot (ops@example.com)".to_string()),
            user_token_param_prefix: env::var("USER_TOKEN_PARAM_PREFIX")
                .unwrap_or_else(|_| DEFAULT_USER_TOKEN_PARAM_PREFIX.to_string()),
            default_channel_id: env::var("DEFAULT_CHANNEL_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            allowed_user_ids: env::var("ALLOWED_USER_IDS")
                .map(|raw| parse_id_list(&raw))
                .unwrap_or_default(),
            timezone,
        })
    }

    #[must_use]
    pub fn model_name(&self) -> String {
        self.openai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string())
    }
}

/// Splits a comma separated id list, dropping blanks.
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_list_drops_blanks_and_whitespace() {
        assert_eq!(
            parse_id_list(" U1, ,U2,,U3 "),
            vec!["U1".to_string(), "U2".to_string(), "U3".to_string()]
        );
        assert!(parse_id_list("").is_empty());
    }
}
