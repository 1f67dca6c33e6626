use std::collections::HashMap;

use serde_json::Value;

use crate::errors::BotError;

/// Fields of a slash command form post that the bot reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

pub fn decode_url_component(raw: &str) -> Result<String, BotError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| BotError::ParseError(format!("Invalid percent-encoding: {e}")))
}

/// Decodes an `application/x-www-form-urlencoded` body.
pub fn parse_form_data(body: &str) -> Result<HashMap<String, String>, BotError> {
    let mut fields = HashMap::new();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        fields.insert(decode_url_component(key)?, decode_url_component(value)?);
    }
    Ok(fields)
}

pub fn is_interactive_body(body: &str) -> bool {
    body.starts_with("payload=") || body.contains("&payload=")
}

pub fn parse_interactive_payload(form_body: &str) -> Result<Value, BotError> {
    let fields = parse_form_data(form_body)?;
    let raw = fields
        .get("payload")
        .ok_or_else(|| BotError::ParseError("Missing payload field".to_string()))?;
    serde_json::from_str(raw)
        .map_err(|e| BotError::ParseError(format!("Invalid JSON payload: {e}")))
}

pub fn parse_slash_command(body: &str) -> Result<SlashCommand, BotError> {
    let mut fields = parse_form_data(body)?;
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();

    let command = take("command");
    let user_id = take("user_id");
    if command.is_empty() || user_id.is_empty() {
        return Err(BotError::ParseError(
            "Slash command is missing command or user_id".to_string(),
        ));
    }
    Ok(SlashCommand {
        command,
        text: take("text"),
        user_id,
        channel_id: take("channel_id"),
    })
}

pub fn v_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

pub fn v_str<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    v_path(root, path).and_then(|v| v.as_str())
}

pub fn v_array<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Vec<Value>> {
    v_path(root, path).and_then(|v| v.as_array())
}

pub fn get_header_value<'a>(headers: &'a Value, name: &str) -> Option<&'a str> {
    if let Some(v) = headers.get(name).and_then(|s| s.as_str()) {
        return Some(v);
    }
    headers.as_object().and_then(|map| {
        map.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                v.as_str()
            } else {
                None
            }
        })
    })
}
