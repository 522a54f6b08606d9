// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;

pub const VERIFIED_CODE: i64 = 200;
pub const PENDING_CODE: i64 = 0;
pub const FAILURE_CODE: i64 = -1;
pub const UNKNOWN_RESPONSE: &str = "Unknown response";
pub const PENDING_STATUS: &str = "Testing...";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationState {
    pub fingerprint: String,
    pub code: i64,
    pub message: String,
}

impl VerificationState {
    pub fn is_unverified(&self) -> bool {
        self.fingerprint.is_empty() && self.code == PENDING_CODE && self.message.is_empty()
    }
}

/// What came back from one verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyReply {
    Answered { code: i64, message: String },
    Transport(String),
}

impl VerifyReply {
    /// Reads `{code, message}` out of a response body. An object without an
    /// integer code, or a body that is not an object at all, counts as an
    /// unknown response.
    pub fn from_json_body(body: &str) -> Self {
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
            return Self::unknown();
        };
        let code = match object.get("code") {
            Some(Value::Number(number)) => match number.as_i64() {
                Some(code) => code,
                None => return Self::unknown(),
            },
            _ => FAILURE_CODE,
        };
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| UNKNOWN_RESPONSE.to_owned(), str::to_owned);
        Self::Answered { code, message }
    }

    pub fn unknown() -> Self {
        Self::Answered {
            code: FAILURE_CODE,
            message: UNKNOWN_RESPONSE.to_owned(),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Answered { code, .. } => *code,
            Self::Transport(_) => FAILURE_CODE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Answered { message, .. } => message,
            Self::Transport(error) => error,
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            Self::Answered { code, message } => format!("{code}: {message}"),
            Self::Transport(error) => format!("Network Error: {error}"),
        }
    }
}

/// Tracks the last verification of one form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationGate {
    state: VerificationState,
}

impl VerificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn invalidate(&mut self) {
        self.state = VerificationState::default();
    }

    pub fn begin(&mut self, fingerprint: String) {
        self.state = VerificationState {
            fingerprint,
            code: PENDING_CODE,
            message: String::new(),
        };
    }

    /// Stores a reply for the request that is still pending. Replies for any
    /// other fingerprint, or arriving after the pending request was already
    /// answered, are dropped and `false` is returned.
    pub fn record(&mut self, fingerprint: String, reply: &VerifyReply) -> bool {
        if self.state.code != PENDING_CODE || self.state.fingerprint != fingerprint {
            tracing::debug!(code = reply.code(), "verification reply dropped");
            return false;
        }
        tracing::debug!(code = reply.code(), "verification reply recorded");
        self.state = VerificationState {
            fingerprint,
            code: reply.code(),
            message: reply.message().to_owned(),
        };
        true
    }

    pub fn can_commit(&self, current_fingerprint: &str) -> bool {
        self.state.code == VERIFIED_CODE && self.state.fingerprint == current_fingerprint
    }

    /// Status shown when a commit is refused.
    pub fn rejection_status(&self, verify_hint: &str) -> String {
        if self.state.message.is_empty() {
            verify_hint.to_owned()
        } else {
            format!("{}: {}", self.state.code, self.state.message)
        }
    }
}
