// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::{ApiProfile, ArxivClass, ChoiceList, PrefKey, PrefsStorage, PromptEntry};

pub const LOG_PLACEHOLDER: &str = "Waiting for process...";

/// Body of a start-recognition submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionRequest {
    pub arxiv_class: Value,
    pub instruction_prompt: Value,
    pub summary_prompt: Value,
    pub folder_path: String,
    pub window_hours: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReply {
    Accepted {
        task_id: Option<String>,
        status: Option<String>,
    },
    ServerError(String),
    Network(String),
}

impl SubmissionReply {
    pub fn from_success_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::Accepted {
                task_id: truthy_text(value.get("task_id")),
                status: truthy_text(value.get("status")),
            },
            Err(error) => Self::Network(format!("invalid response body: {error}")),
        }
    }

    pub fn log_text(&self) -> String {
        match self {
            Self::Accepted {
                task_id: Some(task_id),
                ..
            } => format!("Request Sent! Task ID: {task_id}"),
            Self::Accepted { status, .. } => format!(
                "Request Sent! Status: {}",
                status.as_deref().unwrap_or("unknown")
            ),
            Self::ServerError(reason) => format!("Server Error: {reason}"),
            Self::Network(error) => format!("Network Error: {error}"),
        }
    }
}

fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLog {
    lines: Vec<String>,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self {
            lines: vec![LOG_PLACEHOLDER.to_owned()],
        }
    }
}

impl ProgressLog {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn append(&mut self, at: OffsetDateTime, text: &str) {
        let stamp = at
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default();
        self.lines.push(format!("[{stamp}] {text}"));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Distinct non-empty model names in first-appearance order.
pub fn model_choices(profiles: &[ApiProfile]) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for profile in profiles {
        let model = profile.model.trim();
        if !model.is_empty() && !models.iter().any(|known| known == model) {
            models.push(model.to_owned());
        }
    }
    models
}

/// Picks the model to show. The stored choice wins when it is still offered;
/// otherwise the last model is chosen and flagged for re-persisting.
pub fn resolve_model(stored: Option<&str>, models: &[String]) -> (Option<String>, bool) {
    let Some(last) = models.last() else {
        return (None, false);
    };
    match stored.map(str::trim).filter(|stored| !stored.is_empty()) {
        Some(stored) if models.iter().any(|model| model == stored) => {
            (Some(stored.to_owned()), false)
        }
        _ => (Some(last.clone()), true),
    }
}

/// State of the start-recognition page.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionPage {
    pub classes: ChoiceList<ArxivClass>,
    pub instruction_prompts: ChoiceList<PromptEntry>,
    pub summary_prompts: ChoiceList<PromptEntry>,
    pub folder_path: String,
    pub log: ProgressLog,
    models: Vec<String>,
    model: Option<String>,
    window_hours: String,
}

impl RecognitionPage {
    pub fn open(storage: &dyn PrefsStorage, profiles: &[ApiProfile]) -> Self {
        let window_hours = match storage.get_pref(PrefKey::WindowHours) {
            Ok(value) => value.unwrap_or_default(),
            Err(error) => {
                tracing::warn!("read window hours failed: {error:#}");
                String::new()
            }
        };
        let mut page = Self {
            classes: ChoiceList::load(PrefKey::ArxivClasses, storage),
            instruction_prompts: ChoiceList::load(PrefKey::InstructionPrompts, storage),
            summary_prompts: ChoiceList::load(PrefKey::SummaryPrompts, storage),
            folder_path: String::new(),
            log: ProgressLog::default(),
            models: Vec::new(),
            model: None,
            window_hours,
        };
        page.refresh_models(storage, profiles);
        page
    }

    /// Rebuilds the model picker from the saved profiles.
    pub fn refresh_models(&mut self, storage: &dyn PrefsStorage, profiles: &[ApiProfile]) {
        self.models = model_choices(profiles);
        let stored = match storage.get_pref(PrefKey::Model) {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!("read model preference failed: {error:#}");
                None
            }
        };
        let (model, repersist) = resolve_model(stored.as_deref(), &self.models);
        if repersist {
            if let Some(model) = &model {
                if let Err(error) = storage.set_pref(PrefKey::Model, model) {
                    tracing::warn!("persist model fallback failed: {error:#}");
                }
            }
        }
        self.model = model;
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Moves the picker by `delta` and persists the new choice.
    pub fn cycle_model(&mut self, delta: isize, storage: &dyn PrefsStorage) -> Result<()> {
        if self.models.is_empty() {
            return Ok(());
        }
        let current = self
            .model
            .as_ref()
            .and_then(|model| self.models.iter().position(|known| known == model))
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(self.models.len() as isize) as usize;
        let model = self.models[next].clone();
        storage.set_pref(PrefKey::Model, &model)?;
        self.model = Some(model);
        Ok(())
    }

    pub fn window_hours(&self) -> &str {
        &self.window_hours
    }

    pub fn set_window_hours(&mut self, value: &str, storage: &dyn PrefsStorage) -> Result<()> {
        storage.set_pref(PrefKey::WindowHours, value)?;
        self.window_hours = value.to_owned();
        Ok(())
    }

    pub fn build_request(&self) -> RecognitionRequest {
        RecognitionRequest {
            arxiv_class: self.classes.payload(),
            instruction_prompt: self.instruction_prompts.payload(),
            summary_prompt: self.summary_prompts.payload(),
            folder_path: self.folder_path.clone(),
            window_hours: self.window_hours.clone(),
            model: self.model.clone().unwrap_or_default(),
        }
    }

    pub fn record_reply(&mut self, at: OffsetDateTime, reply: &SubmissionReply) {
        self.log.append(at, &reply.log_text());
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ProgressLog, RecognitionPage, SubmissionReply, model_choices, resolve_model,
    };
    use crate::{ApiProfile, MemoryPrefs, PrefKey, PrefsStorage};
    use anyhow::Result;
    use serde_json::json;
    use time::macros::datetime;

    fn profile(model: &str) -> ApiProfile {
        ApiProfile {
            api_type: "full_url".to_owned(),
            api_url: "https://api.example".to_owned(),
            api_key: "key".to_owned(),
            model: model.to_owned(),
            temperature: 1.0,
            max_tokens: 1024,
            related_number: 5,
        }
    }

    #[test]
    fn model_choices_are_distinct_and_ordered() {
        let profiles = vec![profile(" qwen "), profile(""), profile("deepseek"), profile("qwen")];
        assert_eq!(model_choices(&profiles), vec!["qwen", "deepseek"]);
    }

    #[test]
    fn resolve_model_falls_back_to_the_last_choice() {
        let models = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(resolve_model(Some("a"), &models), (Some("a".to_owned()), false));
        assert_eq!(resolve_model(Some("gone"), &models), (Some("b".to_owned()), true));
        assert_eq!(resolve_model(None, &models), (Some("b".to_owned()), true));
        assert_eq!(resolve_model(Some("a"), &[]), (None, false));
    }

    #[test]
    fn open_repersists_a_fallback_model() -> Result<()> {
        let prefs = MemoryPrefs::with_value(PrefKey::Model, "retired");
        let page = RecognitionPage::open(&prefs, &[profile("qwen"), profile("deepseek")]);
        assert_eq!(page.model(), Some("deepseek"));
        assert_eq!(prefs.get_pref(PrefKey::Model)?.as_deref(), Some("deepseek"));
        Ok(())
    }

    #[test]
    fn request_collects_every_input() -> Result<()> {
        let prefs = MemoryPrefs::new();
        let mut page = RecognitionPage::open(&prefs, &[profile("qwen")]);
        page.classes.add("AI", "cs.AI", &prefs)?;
        page.classes.toggle(0);
        page.folder_path = "/data/papers".to_owned();
        page.set_window_hours("24", &prefs)?;

        let request = serde_json::to_value(page.build_request())?;
        assert_eq!(
            request,
            json!({
                "arxiv_class": {"name": "AI", "description": "cs.AI"},
                "instruction_prompt": {},
                "summary_prompt": {},
                "folder_path": "/data/papers",
                "window_hours": "24",
                "model": "qwen",
            })
        );
        assert_eq!(prefs.raw(PrefKey::WindowHours).as_deref(), Some("24"));
        Ok(())
    }

    #[test]
    fn cycle_model_persists_the_choice() -> Result<()> {
        let prefs = MemoryPrefs::new();
        let mut page = RecognitionPage::open(&prefs, &[profile("a"), profile("b")]);
        assert_eq!(page.model(), Some("b"));
        page.cycle_model(1, &prefs)?;
        assert_eq!(page.model(), Some("a"));
        assert_eq!(prefs.raw(PrefKey::Model).as_deref(), Some("a"));
        Ok(())
    }

    #[test]
    fn replies_render_as_timestamped_log_lines() {
        let at = datetime!(2026-03-01 09:05:07 UTC);
        let mut log = ProgressLog::default();
        assert_eq!(log.text(), "Waiting for process...");

        log.append(at, &SubmissionReply::from_success_body(r#"{"task_id":"t-1"}"#).log_text());
        log.append(at, &SubmissionReply::from_success_body(r#"{"status":"queued"}"#).log_text());
        log.append(at, &SubmissionReply::ServerError("Bad Gateway".to_owned()).log_text());
        log.append(at, &SubmissionReply::Network("refused".to_owned()).log_text());
        assert_eq!(
            log.lines()[1..],
            [
                "[09:05:07] Request Sent! Task ID: t-1".to_owned(),
                "[09:05:07] Request Sent! Status: queued".to_owned(),
                "[09:05:07] Server Error: Bad Gateway".to_owned(),
                "[09:05:07] Network Error: refused".to_owned(),
            ]
        );

        log.clear();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn numeric_task_ids_are_rendered() {
        assert_eq!(
            SubmissionReply::from_success_body(r#"{"task_id":42}"#).log_text(),
            "Request Sent! Task ID: 42"
        );
        assert!(matches!(
            SubmissionReply::from_success_body("not json"),
            SubmissionReply::Network(_)
        ));
    }
}
