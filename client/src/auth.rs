//! HTTP auth/roster boundary client.
//!
//! The synchronization core only consumes the resulting JWT string and the
//! selected character record; everything here is a thin blocking wrapper
//! with short timeouts. Failures are reported in `AuthResult::message`
//! rather than raised.

use log::warn;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub ok: bool,
    pub token: String,
    pub message: String,
}

impl AuthResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            token: String::new(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterInfo {
    pub id: String,
    pub name: String,
    pub class: String,
}

pub struct AuthClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

fn token_from(body: &Value) -> Option<String> {
    for key in ["token", "accessToken", "jwt"] {
        if let Some(token) = body.get(key).and_then(Value::as_str) {
            return Some(token.to_string());
        }
    }
    None
}

fn character_from(value: &Value) -> Option<CharacterInfo> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| value.get("characterId").and_then(Value::as_str))?;
    Some(CharacterInfo {
        id: id.to_string(),
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string(),
        class: value
            .get("class")
            .and_then(Value::as_str)
            .or_else(|| value.get("className").and_then(Value::as_str))
            .unwrap_or("Unknown")
            .to_string(),
    })
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn login(&self, username: &str, password: &str) -> AuthResult {
        self.submit("/v1/auth/login", username, password)
    }

    pub fn register(&self, username: &str, password: &str) -> AuthResult {
        self.submit("/v1/auth/register", username, password)
    }

    fn submit(&self, path: &str, username: &str, password: &str) -> AuthResult {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "email": username, "password": password }))
            .send();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Auth request to {url} failed: {e}");
                return AuthResult::failure("Auth request failed");
            }
        };

        let status = response.status();
        if !status.is_success() {
            return AuthResult::failure(format!("Auth error HTTP {}", status.as_u16()));
        }

        let body: Value = match response.json() {
            Ok(body) => body,
            Err(_) => return AuthResult::failure("Invalid auth response JSON"),
        };

        match token_from(&body) {
            Some(token) => AuthResult {
                ok: true,
                token,
                message: "Authenticated".to_string(),
            },
            None => AuthResult::failure("Auth succeeded but token not found"),
        }
    }

    /// Character roster for the authenticated account. Network or decode
    /// failures degrade to an empty roster.
    pub fn fetch_characters(&self, jwt: &str) -> Vec<CharacterInfo> {
        let url = format!("{}/v1/characters", self.base_url);
        let body: Value = match self
            .http
            .get(&url)
            .bearer_auth(jwt)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
        {
            Ok(body) => body,
            Err(e) => {
                warn!("Character roster fetch failed: {e}");
                return Vec::new();
            }
        };

        let list = body
            .get("characters")
            .and_then(Value::as_array)
            .or_else(|| body.as_array());
        match list {
            Some(list) => list.iter().filter_map(character_from).collect(),
            None => Vec::new(),
        }
    }

    pub fn create_character(&self, jwt: &str, name: &str, class: &str) -> Option<CharacterInfo> {
        let url = format!("{}/v1/characters", self.base_url);
        let body: Value = match self
            .http
            .post(&url)
            .bearer_auth(jwt)
            .json(&json!({ "name": name, "class": class }))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
        {
            Ok(body) => body,
            Err(e) => {
                warn!("Character creation failed: {e}");
                return None;
            }
        };

        character_from(body.get("character").unwrap_or(&body))
    }
}
