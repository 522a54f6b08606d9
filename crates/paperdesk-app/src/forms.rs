// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Number, Value, json};

use crate::{ApiProfile, ApiToken, DEFAULT_API_TYPE, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

pub const API_TYPES: [&str; 2] = ["full_url", "base_url"];

const FORM_DEFAULT_RELATED_NUMBER: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    ApiType,
    ApiUrl,
    ApiKey,
    Model,
    Temperature,
    MaxTokens,
    RelatedNumber,
}

impl ProfileField {
    pub const ALL: [Self; 7] = [
        Self::ApiType,
        Self::ApiUrl,
        Self::ApiKey,
        Self::Model,
        Self::Temperature,
        Self::MaxTokens,
        Self::RelatedNumber,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ApiType => "api type",
            Self::ApiUrl => "api url",
            Self::ApiKey => "api key",
            Self::Model => "model",
            Self::Temperature => "temperature",
            Self::MaxTokens => "max tokens",
            Self::RelatedNumber => "related number",
        }
    }

    pub const fn is_secret(self) -> bool {
        matches!(self, Self::ApiKey)
    }

    pub const fn is_choice(self) -> bool {
        matches!(self, Self::ApiType)
    }
}

/// Raw text of the profile form, exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileForm {
    pub api_type: String,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: String,
    pub max_tokens: String,
    pub related_number: String,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            api_type: DEFAULT_API_TYPE.to_owned(),
            api_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS.to_string(),
            related_number: FORM_DEFAULT_RELATED_NUMBER.to_string(),
        }
    }
}

impl ProfileForm {
    pub fn value(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::ApiType => &self.api_type,
            ProfileField::ApiUrl => &self.api_url,
            ProfileField::ApiKey => &self.api_key,
            ProfileField::Model => &self.model,
            ProfileField::Temperature => &self.temperature,
            ProfileField::MaxTokens => &self.max_tokens,
            ProfileField::RelatedNumber => &self.related_number,
        }
    }

    pub fn value_mut(&mut self, field: ProfileField) -> &mut String {
        match field {
            ProfileField::ApiType => &mut self.api_type,
            ProfileField::ApiUrl => &mut self.api_url,
            ProfileField::ApiKey => &mut self.api_key,
            ProfileField::Model => &mut self.model,
            ProfileField::Temperature => &mut self.temperature,
            ProfileField::MaxTokens => &mut self.max_tokens,
            ProfileField::RelatedNumber => &mut self.related_number,
        }
    }

    pub fn cycle_api_type(&mut self, delta: isize) {
        let current = API_TYPES
            .iter()
            .position(|kind| *kind == self.api_type.trim())
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(API_TYPES.len() as isize) as usize;
        self.api_type = API_TYPES[next].to_owned();
    }

    pub fn fill_from(&mut self, profile: &ApiProfile) {
        self.api_type = profile.api_type.clone();
        self.api_url = profile.api_url.clone();
        self.api_key = profile.api_key.clone();
        self.model = profile.model.clone();
        self.temperature = profile.temperature.to_string();
        self.max_tokens = profile.max_tokens.to_string();
        self.related_number = profile.related_number.to_string();
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            api_type: self.api_type.trim().to_owned(),
            api_url: self.api_url.trim().to_owned(),
            api_key: self.api_key.trim().to_owned(),
            model: self.model.trim().to_owned(),
            temperature: numeric_value(&self.temperature),
            max_tokens: numeric_value(&self.max_tokens),
            related_number: numeric_value(&self.related_number),
        }
    }

    /// Builds the record that a save appends. Blank or zero numbers fall back
    /// to the form defaults.
    pub fn to_profile(&self) -> ApiProfile {
        let api_type = self.api_type.trim();
        ApiProfile {
            api_type: if api_type.is_empty() {
                DEFAULT_API_TYPE.to_owned()
            } else {
                api_type.to_owned()
            },
            api_url: self.api_url.trim().to_owned(),
            api_key: self.api_key.trim().to_owned(),
            model: self.model.trim().to_owned(),
            temperature: nonzero_number(&self.temperature).unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: nonzero_number(&self.max_tokens)
                .map(|value| value.trunc() as i64)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            related_number: nonzero_number(&self.related_number)
                .map(|value| value.trunc() as i64)
                .unwrap_or(FORM_DEFAULT_RELATED_NUMBER),
        }
    }
}

/// Trimmed, number-parsed view of the profile form. Both the verification
/// request body and the fingerprint are derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    pub api_type: String,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Value,
    pub max_tokens: Value,
    pub related_number: Value,
}

impl ProfileSnapshot {
    pub fn to_json(&self) -> Value {
        json!({
            "apiType": self.api_type,
            "apiUrl": self.api_url,
            "apiKey": self.api_key,
            "model": self.model,
            "temperature": self.temperature,
            "maxTokens": self.max_tokens,
            "relatedNumber": self.related_number,
        })
    }

    // serde_json maps keep keys sorted, so the rendering is canonical.
    pub fn fingerprint(&self) -> String {
        self.to_json().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenForm {
    pub input: String,
}

impl TokenForm {
    pub fn trimmed(&self) -> &str {
        self.input.trim()
    }

    pub fn fingerprint(&self) -> String {
        self.trimmed().to_owned()
    }

    pub fn token(&self) -> Option<ApiToken> {
        ApiToken::new(&self.input)
    }
}

// Blank text reads as zero and unparsable text as null, matching how the
// controller receives an untouched or garbled numeric input.
fn numeric_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::from(0);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => number_value(value),
        _ => Value::Null,
    }
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Value::from(value as i64);
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn nonzero_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value != 0.0)
}

#[cfg(test)]
mod tests {
    use super::{ProfileField, ProfileForm, TokenForm};
    use crate::ApiProfile;
    use serde_json::{Value, json};

    fn filled_form() -> ProfileForm {
        ProfileForm {
            api_type: "full_url".to_owned(),
            api_url: " https://api.example/v1/chat ".to_owned(),
            api_key: "sk-123456".to_owned(),
            model: "qwen3".to_owned(),
            temperature: "0.7".to_owned(),
            max_tokens: "8192".to_owned(),
            related_number: "10".to_owned(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic_and_trims_whitespace() {
        let form = filled_form();
        let mut padded = form.clone();
        padded.model = "  qwen3 ".to_owned();
        assert_eq!(form.snapshot().fingerprint(), form.snapshot().fingerprint());
        assert_eq!(form.snapshot().fingerprint(), padded.snapshot().fingerprint());
    }

    #[test]
    fn any_single_field_change_changes_the_fingerprint() {
        let base = filled_form();
        let baseline = base.snapshot().fingerprint();
        for field in ProfileField::ALL {
            let mut edited = base.clone();
            edited.value_mut(field).push('9');
            assert_ne!(
                edited.snapshot().fingerprint(),
                baseline,
                "{} edit should change fingerprint",
                field.label()
            );
        }
    }

    #[test]
    fn fingerprint_does_not_confuse_field_boundaries() {
        let mut left = filled_form();
        left.api_url = "ab".to_owned();
        left.api_key = "c".to_owned();
        let mut right = filled_form();
        right.api_url = "a".to_owned();
        right.api_key = "bc".to_owned();
        assert_ne!(left.snapshot().fingerprint(), right.snapshot().fingerprint());
    }

    #[test]
    fn snapshot_parses_numbers_like_the_controller_expects() {
        let mut form = filled_form();
        form.temperature = String::new();
        form.max_tokens = "lots".to_owned();
        let snapshot = form.snapshot();
        assert_eq!(snapshot.temperature, json!(0));
        assert_eq!(snapshot.max_tokens, Value::Null);
        assert_eq!(snapshot.related_number, json!(10));
        assert_eq!(snapshot.to_json()["apiUrl"], json!("https://api.example/v1/chat"));
    }

    #[test]
    fn to_profile_applies_defaults_for_blank_inputs() {
        let form = ProfileForm {
            api_type: " ".to_owned(),
            api_url: "https://api.example".to_owned(),
            api_key: "key".to_owned(),
            model: "m".to_owned(),
            temperature: "0".to_owned(),
            max_tokens: String::new(),
            related_number: "nope".to_owned(),
        };
        let profile = form.to_profile();
        assert_eq!(profile.api_type, "full_url");
        assert_eq!(profile.temperature, 1.0);
        assert_eq!(profile.max_tokens, 32768);
        assert_eq!(profile.related_number, 5);
    }

    #[test]
    fn fill_from_round_trips_through_to_profile() {
        let profile = ApiProfile {
            api_type: "base_url".to_owned(),
            api_url: "https://api.example".to_owned(),
            api_key: "secret-key".to_owned(),
            model: "deepseek".to_owned(),
            temperature: 0.3,
            max_tokens: 2048,
            related_number: 7,
        };
        let mut form = ProfileForm::default();
        form.fill_from(&profile);
        assert_eq!(form.to_profile(), profile);
    }

    #[test]
    fn api_type_cycles_through_known_kinds() {
        let mut form = ProfileForm::default();
        form.cycle_api_type(1);
        assert_eq!(form.api_type, "base_url");
        form.cycle_api_type(1);
        assert_eq!(form.api_type, "full_url");
        form.cycle_api_type(-1);
        assert_eq!(form.api_type, "base_url");
    }

    #[test]
    fn token_form_trims_and_rejects_blank_input() {
        let form = TokenForm {
            input: "  tok_abcdefgh  ".to_owned(),
        };
        assert_eq!(form.fingerprint(), "tok_abcdefgh");
        assert!(TokenForm::default().token().is_none());
    }
}
