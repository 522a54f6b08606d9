// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_API_TYPE: &str = "full_url";
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_MAX_TOKENS: i64 = 32768;
pub const DEFAULT_RELATED_NUMBER: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefKey {
    SavedConfigs,
    MineruTokens,
    ArxivClasses,
    InstructionPrompts,
    SummaryPrompts,
    Model,
    WindowHours,
}

impl PrefKey {
    pub const ALL: [Self; 7] = [
        Self::SavedConfigs,
        Self::MineruTokens,
        Self::ArxivClasses,
        Self::InstructionPrompts,
        Self::SummaryPrompts,
        Self::Model,
        Self::WindowHours,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SavedConfigs => "paperdesk.savedConfigs",
            Self::MineruTokens => "paperdesk.mineruTokens",
            Self::ArxivClasses => "paperdesk.arxivClasses",
            Self::InstructionPrompts => "paperdesk.instructionPrompts",
            Self::SummaryPrompts => "paperdesk.summaryPrompts",
            Self::Model => "paperdesk.model",
            Self::WindowHours => "paperdesk.windowHours",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Profiles,
    Tokens,
    Recognition,
}

impl TabKind {
    pub const ALL: [Self; 3] = [Self::Profiles, Self::Tokens, Self::Recognition];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Tokens => "tokens",
            Self::Recognition => "recognition",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Form,
    Find,
}

/// Implemented by every list element that lives in a preference value.
///
/// `normalize` receives one element of the persisted JSON array and returns
/// `None` when the element cannot be coerced into a complete record.
pub trait StoredRecord: Serialize + Clone {
    fn normalize(value: &Value) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    pub api_type: String,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub related_number: i64,
}

impl StoredRecord for ApiProfile {
    fn normalize(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            api_type: coerce_text(object.get("apiType")),
            api_url: coerce_text(object.get("apiUrl")),
            api_key: coerce_text(object.get("apiKey")),
            model: coerce_text(object.get("model")),
            temperature: coerce_number(object.get("temperature")).unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: coerce_number(object.get("maxTokens"))
                .map(|value| value.trunc() as i64)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            related_number: coerce_number(object.get("relatedNumber"))
                .map(|value| value.trunc() as i64)
                .unwrap_or(DEFAULT_RELATED_NUMBER),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StoredRecord for ApiToken {
    fn normalize(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArxivClass {
    pub name: String,
    pub description: String,
}

impl StoredRecord for ArxivClass {
    fn normalize(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = coerce_text(object.get("name"));
        if name.trim().is_empty() {
            return None;
        }
        Some(Self {
            name,
            description: coerce_text(object.get("description")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    pub name: String,
    pub content: String,
}

impl StoredRecord for PromptEntry {
    fn normalize(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = coerce_text(object.get("name"));
        if name.trim().is_empty() {
            return None;
        }
        Some(Self {
            name,
            content: coerce_text(object.get("content")),
        })
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(true)) => "true".to_owned(),
        _ => String::new(),
    }
}

// Null and absent fall back to the caller's default, as do strings that do
// not parse and non-finite values.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => return None,
    };
    number.is_finite().then_some(number)
}
