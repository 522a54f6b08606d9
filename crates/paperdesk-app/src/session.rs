// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    ApiProfile, ApiToken, CheckboxDecorator, PENDING_STATUS, PrefKey, PrefsStorage, ProfileField,
    ProfileForm, ProfileSnapshot, ProfileTable, RecordStore, SelectionQuery, SelectionReconciler,
    TableController, TokenForm, TokenTable, VerificationGate, VerifyReply,
};

pub const SAVED_STATUS: &str = "200: Saved";
pub const VERIFY_PROFILE_FIRST: &str = "Verify the profile (t) until it returns 200, then save.";
pub const VERIFY_TOKEN_FIRST: &str = "Verify the token (t) until it returns 200, then submit.";
pub const EDIT_NEEDS_ONE_ROW: &str = "Please select exactly one row to edit.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Profile,
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Status { form: FormKind, text: String },
    ProfilesChanged,
    TokensChanged,
    Notice(String),
    PersistFailed { form: FormKind, error: String },
}

/// A verification that has been started and still needs its reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileVerifyTicket {
    pub fingerprint: String,
    pub snapshot: ProfileSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenVerifyTicket {
    pub token: String,
}

/// Everything one open settings view owns. Created on open, dropped on
/// close; verification state is never persisted.
#[derive(Debug, Clone)]
pub struct PrefsSession {
    profiles: RecordStore<ApiProfile>,
    tokens: RecordStore<ApiToken>,
    profile_form: ProfileForm,
    token_form: TokenForm,
    profile_gate: VerificationGate,
    token_gate: VerificationGate,
    profile_checks: SelectionReconciler,
    token_checks: SelectionReconciler,
    editing_index: Option<usize>,
    profile_status: String,
    token_status: String,
}

impl PrefsSession {
    pub fn open(storage: &dyn PrefsStorage) -> Self {
        let profiles = RecordStore::load(PrefKey::SavedConfigs, storage);
        let tokens = RecordStore::load(PrefKey::MineruTokens, storage);
        tracing::info!(
            profiles = profiles.len(),
            tokens = tokens.len(),
            "settings session opened"
        );
        Self {
            profiles,
            tokens,
            profile_form: ProfileForm::default(),
            token_form: TokenForm::default(),
            profile_gate: VerificationGate::new(),
            token_gate: VerificationGate::new(),
            profile_checks: SelectionReconciler::new(),
            token_checks: SelectionReconciler::new(),
            editing_index: None,
            profile_status: String::new(),
            token_status: String::new(),
        }
    }

    pub fn profiles(&self) -> &[ApiProfile] {
        self.profiles.records()
    }

    pub fn tokens(&self) -> &[ApiToken] {
        self.tokens.records()
    }

    pub fn profile_form(&self) -> &ProfileForm {
        &self.profile_form
    }

    pub fn token_form(&self) -> &TokenForm {
        &self.token_form
    }

    pub fn profile_gate(&self) -> &VerificationGate {
        &self.profile_gate
    }

    pub fn token_gate(&self) -> &VerificationGate {
        &self.token_gate
    }

    pub fn profile_checks(&self) -> &SelectionReconciler {
        &self.profile_checks
    }

    pub fn token_checks(&self) -> &SelectionReconciler {
        &self.token_checks
    }

    pub fn editing_index(&self) -> Option<usize> {
        self.editing_index
    }

    pub fn status(&self, form: FormKind) -> &str {
        match form {
            FormKind::Profile => &self.profile_status,
            FormKind::Token => &self.token_status,
        }
    }

    pub fn profile_table(&self) -> TableController<ProfileTable<'_>, CheckboxDecorator> {
        TableController::new(
            ProfileTable::new(self.profiles.records()),
            CheckboxDecorator::PROFILES,
        )
    }

    pub fn token_table(&self) -> TableController<TokenTable<'_>, CheckboxDecorator> {
        TableController::new(
            TokenTable::new(self.tokens.records()),
            CheckboxDecorator::TOKENS,
        )
    }

    pub fn can_save_profile(&self) -> bool {
        self.profile_gate
            .can_commit(&self.profile_form.snapshot().fingerprint())
    }

    pub fn can_submit_token(&self) -> bool {
        let current = self.token_form.fingerprint();
        !current.is_empty() && self.token_gate.can_commit(&current)
    }

    pub fn set_profile_field(&mut self, field: ProfileField, value: &str) -> Vec<SessionEvent> {
        value.clone_into(self.profile_form.value_mut(field));
        self.reset_profile_gate()
    }

    pub fn cycle_api_type(&mut self, delta: isize) -> Vec<SessionEvent> {
        self.profile_form.cycle_api_type(delta);
        self.reset_profile_gate()
    }

    pub fn set_token_input(&mut self, value: &str) -> Vec<SessionEvent> {
        value.clone_into(&mut self.token_form.input);
        self.token_gate.invalidate();
        self.set_status(FormKind::Token, String::new())
    }

    pub fn toggle_profile_check(&mut self, index: usize) {
        if index < self.profiles.len() {
            self.profile_checks.toggle(index);
        }
    }

    pub fn toggle_token_check(&mut self, index: usize) {
        if index < self.tokens.len() {
            self.token_checks.toggle(index);
        }
    }

    pub fn begin_profile_verify(&mut self) -> (ProfileVerifyTicket, Vec<SessionEvent>) {
        let snapshot = self.profile_form.snapshot();
        let fingerprint = snapshot.fingerprint();
        self.profile_gate.begin(fingerprint.clone());
        let events = self.set_status(FormKind::Profile, PENDING_STATUS.to_owned());
        (
            ProfileVerifyTicket {
                fingerprint,
                snapshot,
            },
            events,
        )
    }

    /// Applies a reply only when it answers the pending request. A reply for
    /// input the user has since edited, or for an older request, leaves the
    /// gate and the status untouched.
    pub fn finish_profile_verify(
        &mut self,
        fingerprint: String,
        reply: &VerifyReply,
    ) -> Vec<SessionEvent> {
        if !self.profile_gate.record(fingerprint, reply) {
            return Vec::new();
        }
        tracing::info!(code = reply.code(), "profile verification finished");
        self.set_status(FormKind::Profile, reply.status_text())
    }

    pub fn begin_token_verify(&mut self) -> (TokenVerifyTicket, Vec<SessionEvent>) {
        let token = self.token_form.fingerprint();
        self.token_gate.begin(token.clone());
        let events = self.set_status(FormKind::Token, PENDING_STATUS.to_owned());
        (TokenVerifyTicket { token }, events)
    }

    pub fn finish_token_verify(&mut self, token: String, reply: &VerifyReply) -> Vec<SessionEvent> {
        if !self.token_gate.record(token, reply) {
            return Vec::new();
        }
        tracing::info!(code = reply.code(), "token verification finished");
        self.set_status(FormKind::Token, reply.status_text())
    }

    /// Appends the form as a new profile when the current input is verified.
    /// Editing a row still appends; rows are never replaced in place.
    pub fn save_profile(&mut self, storage: &dyn PrefsStorage) -> Vec<SessionEvent> {
        if !self.can_save_profile() {
            tracing::info!(
                code = self.profile_gate.state().code,
                "profile save refused by verification gate"
            );
            let text = self.profile_gate.rejection_status(VERIFY_PROFILE_FIRST);
            return self.set_status(FormKind::Profile, text);
        }

        self.profiles.append(self.profile_form.to_profile());
        self.profile_gate.invalidate();
        self.editing_index = None;
        let mut events = vec![SessionEvent::ProfilesChanged];
        match self.profiles.save(storage) {
            Ok(()) => events.extend(self.set_status(FormKind::Profile, SAVED_STATUS.to_owned())),
            Err(error) => events.extend(self.persist_failed(FormKind::Profile, &error)),
        }
        events
    }

    pub fn submit_token(&mut self, storage: &dyn PrefsStorage) -> Vec<SessionEvent> {
        if !self.can_submit_token() {
            tracing::info!(
                code = self.token_gate.state().code,
                "token submit refused by verification gate"
            );
            let text = self.token_gate.rejection_status(VERIFY_TOKEN_FIRST);
            return self.set_status(FormKind::Token, text);
        }
        let Some(token) = self.token_form.token() else {
            return Vec::new();
        };
        if self.tokens.contains(&token) {
            tracing::debug!("duplicate token submit ignored");
            return Vec::new();
        }

        self.tokens.append(token);
        self.token_form.input.clear();
        self.token_gate.invalidate();
        let mut events = vec![SessionEvent::TokensChanged];
        match self.tokens.save(storage) {
            Ok(()) => events.extend(self.set_status(FormKind::Token, SAVED_STATUS.to_owned())),
            Err(error) => events.extend(self.persist_failed(FormKind::Token, &error)),
        }
        events
    }

    /// Deletes the union of checked rows and the native selection. An empty
    /// target set is a silent no-op.
    pub fn delete_profiles(
        &mut self,
        native: &dyn SelectionQuery,
        storage: &dyn PrefsStorage,
    ) -> Vec<SessionEvent> {
        let targets = self.profile_checks.bulk_targets(native);
        if targets.is_empty() {
            return Vec::new();
        }
        let removed = self.profiles.remove_indices(&targets);
        self.profile_checks.clear();
        self.editing_index = None;
        tracing::info!(removed, "profiles deleted");
        let mut events = vec![SessionEvent::ProfilesChanged];
        if let Err(error) = self.profiles.save(storage) {
            events.extend(self.persist_failed(FormKind::Profile, &error));
        }
        events
    }

    pub fn delete_tokens(
        &mut self,
        native: &dyn SelectionQuery,
        storage: &dyn PrefsStorage,
    ) -> Vec<SessionEvent> {
        let targets = self.token_checks.bulk_targets(native);
        if targets.is_empty() {
            return Vec::new();
        }
        let removed = self.tokens.remove_indices(&targets);
        self.token_checks.clear();
        tracing::info!(removed, "tokens deleted");
        let mut events = vec![SessionEvent::TokensChanged];
        if let Err(error) = self.tokens.save(storage) {
            events.extend(self.persist_failed(FormKind::Token, &error));
        }
        events
    }

    /// Loads the single natively selected profile into the form.
    pub fn edit_selected_profile(&mut self, native: &dyn SelectionQuery) -> Vec<SessionEvent> {
        let selected = native.selected();
        let Some(index) = selected.first().copied().filter(|_| selected.len() == 1) else {
            return vec![SessionEvent::Notice(EDIT_NEEDS_ONE_ROW.to_owned())];
        };
        let Some(profile) = self.profiles.get(index).cloned() else {
            return Vec::new();
        };
        self.profile_form.fill_from(&profile);
        self.editing_index = Some(index);
        self.reset_profile_gate()
    }

    fn reset_profile_gate(&mut self) -> Vec<SessionEvent> {
        self.profile_gate.invalidate();
        self.set_status(FormKind::Profile, String::new())
    }

    fn set_status(&mut self, form: FormKind, text: String) -> Vec<SessionEvent> {
        match form {
            FormKind::Profile => self.profile_status.clone_from(&text),
            FormKind::Token => self.token_status.clone_from(&text),
        }
        vec![SessionEvent::Status { form, text }]
    }

    fn persist_failed(&mut self, form: FormKind, error: &anyhow::Error) -> Vec<SessionEvent> {
        tracing::error!("{error:#}");
        let mut events = vec![SessionEvent::PersistFailed {
            form,
            error: format!("{error:#}"),
        }];
        events.extend(self.set_status(form, format!("Save failed: {error:#}")));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EDIT_NEEDS_ONE_ROW, FormKind, PrefsSession, SAVED_STATUS, SessionEvent, VERIFY_PROFILE_FIRST,
        VERIFY_TOKEN_FIRST,
    };
    use crate::{
        MemoryPrefs, PrefKey, PrefsStorage, ProfileField, RecordStore, RowSelection, VerifyReply,
    };
    use anyhow::{Result, bail};

    fn ok() -> VerifyReply {
        VerifyReply::Answered {
            code: 200,
            message: "OK".to_owned(),
        }
    }

    fn filled_session(prefs: &MemoryPrefs) -> PrefsSession {
        let mut session = PrefsSession::open(prefs);
        session.set_profile_field(ProfileField::ApiUrl, "https://api.example/v1");
        session.set_profile_field(ProfileField::ApiKey, "sk-abcdef123");
        session.set_profile_field(ProfileField::Model, "qwen3");
        session
    }

    fn verified_profile(session: &mut PrefsSession) {
        let (ticket, _) = session.begin_profile_verify();
        session.finish_profile_verify(ticket.fingerprint, &ok());
    }

    struct ReadOnlyPrefs;

    impl PrefsStorage for ReadOnlyPrefs {
        fn get_pref(&self, _key: PrefKey) -> Result<Option<String>> {
            Ok(None)
        }

        fn set_pref(&self, _key: PrefKey, _value: &str) -> Result<()> {
            bail!("database is read-only")
        }
    }

    #[test]
    fn save_without_verification_is_a_gated_noop() {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        let events = session.save_profile(&prefs);
        assert_eq!(
            events,
            vec![SessionEvent::Status {
                form: FormKind::Profile,
                text: VERIFY_PROFILE_FIRST.to_owned()
            }]
        );
        assert!(session.profiles().is_empty());
        assert_eq!(prefs.write_count(), 0);
    }

    #[test]
    fn verified_save_appends_persists_and_resets_the_gate() -> Result<()> {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        verified_profile(&mut session);
        assert!(session.can_save_profile());

        let events = session.save_profile(&prefs);
        assert!(events.contains(&SessionEvent::ProfilesChanged));
        assert_eq!(session.status(FormKind::Profile), SAVED_STATUS);
        assert!(!session.can_save_profile());
        assert!(session.profile_gate().state().is_unverified());

        let stored = RecordStore::<crate::ApiProfile>::load(PrefKey::SavedConfigs, &prefs);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.records()[0].model, "qwen3");
        assert_eq!(stored.records()[0].related_number, 5);
        Ok(())
    }

    #[test]
    fn editing_after_verification_locks_the_save_again() {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        verified_profile(&mut session);
        session.set_profile_field(ProfileField::Model, "qwen3-max");
        assert!(!session.can_save_profile());
        assert_eq!(session.status(FormKind::Profile), "");
        session.save_profile(&prefs);
        assert!(session.profiles().is_empty());
    }

    #[test]
    fn stale_success_cannot_unlock_changed_input() {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        let (ticket, _) = session.begin_profile_verify();
        session.set_profile_field(ProfileField::ApiKey, "sk-other-key");
        let events = session.finish_profile_verify(ticket.fingerprint, &ok());
        assert!(events.is_empty());
        assert_eq!(session.status(FormKind::Profile), "");
        assert!(!session.can_save_profile());
    }

    #[test]
    fn older_reply_arriving_last_keeps_the_newer_verification() {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        let (first, _) = session.begin_profile_verify();
        session.set_profile_field(ProfileField::ApiKey, "sk-other-key");
        let (second, _) = session.begin_profile_verify();

        session.finish_profile_verify(second.fingerprint, &ok());
        assert!(session.can_save_profile());

        let events = session.finish_profile_verify(
            first.fingerprint,
            &VerifyReply::Answered {
                code: 401,
                message: "invalid key".to_owned(),
            },
        );
        assert!(events.is_empty());
        assert!(session.can_save_profile());
        assert_eq!(session.status(FormKind::Profile), "200: OK");
    }

    #[test]
    fn failed_verification_status_is_repeated_on_save() {
        let prefs = MemoryPrefs::new();
        let mut session = filled_session(&prefs);
        let (ticket, events) = session.begin_profile_verify();
        assert_eq!(
            events,
            vec![SessionEvent::Status {
                form: FormKind::Profile,
                text: "Testing...".to_owned()
            }]
        );
        session.finish_profile_verify(
            ticket.fingerprint,
            &VerifyReply::Answered {
                code: 422,
                message: "temperature must be within [0, 2]".to_owned(),
            },
        );
        session.save_profile(&prefs);
        assert_eq!(
            session.status(FormKind::Profile),
            "422: temperature must be within [0, 2]"
        );
    }

    #[test]
    fn token_submit_requires_verification_and_skips_duplicates() {
        let prefs = MemoryPrefs::new();
        let mut session = PrefsSession::open(&prefs);
        session.set_token_input("  tok_abcdefgh ");
        session.submit_token(&prefs);
        assert_eq!(session.status(FormKind::Token), VERIFY_TOKEN_FIRST);

        let (ticket, _) = session.begin_token_verify();
        assert_eq!(ticket.token, "tok_abcdefgh");
        session.finish_token_verify(ticket.token, &ok());
        let events = session.submit_token(&prefs);
        assert!(events.contains(&SessionEvent::TokensChanged));
        assert_eq!(session.token_form().input, "");
        assert_eq!(session.status(FormKind::Token), SAVED_STATUS);
        assert_eq!(
            prefs.raw(PrefKey::MineruTokens).as_deref(),
            Some(r#"["tok_abcdefgh"]"#)
        );

        session.set_token_input("tok_abcdefgh");
        let (ticket, _) = session.begin_token_verify();
        session.finish_token_verify(ticket.token, &ok());
        assert!(session.submit_token(&prefs).is_empty());
        assert_eq!(session.tokens().len(), 1);
    }

    #[test]
    fn blank_token_never_passes_the_gate() {
        let prefs = MemoryPrefs::new();
        let mut session = PrefsSession::open(&prefs);
        let (ticket, _) = session.begin_token_verify();
        session.finish_token_verify(ticket.token, &ok());
        assert!(!session.can_submit_token());
        assert_eq!(session.submit_token(&prefs).len(), 1);
        assert!(session.tokens().is_empty());
    }

    #[test]
    fn delete_uses_the_union_and_clears_checks() {
        let prefs = MemoryPrefs::with_value(
            PrefKey::MineruTokens,
            r#"["t0","t1","t2","t3","t4"]"#,
        );
        let mut session = PrefsSession::open(&prefs);
        session.toggle_token_check(1);
        let mut native = RowSelection::default();
        native.select_only(3);

        let events = session.delete_tokens(&native, &prefs);
        assert_eq!(events, vec![SessionEvent::TokensChanged]);
        let left: Vec<&str> = session.tokens().iter().map(|token| token.as_str()).collect();
        assert_eq!(left, vec!["t0", "t2", "t4"]);
        assert!(session.token_checks().checked().is_empty());
        assert_eq!(
            prefs.raw(PrefKey::MineruTokens).as_deref(),
            Some(r#"["t0","t2","t4"]"#)
        );
    }

    #[test]
    fn delete_with_no_targets_is_silent() {
        let prefs = MemoryPrefs::with_value(PrefKey::MineruTokens, r#"["t0"]"#);
        let mut session = PrefsSession::open(&prefs);
        assert!(session.delete_tokens(&RowSelection::default(), &prefs).is_empty());
        assert!(session.delete_profiles(&RowSelection::default(), &prefs).is_empty());
        assert_eq!(prefs.write_count(), 0);
    }

    #[test]
    fn edit_requires_exactly_one_selected_row() {
        let prefs = MemoryPrefs::with_value(
            PrefKey::SavedConfigs,
            r#"[{"apiUrl":"https://a","model":"m1"},{"apiUrl":"https://b","model":"m2"}]"#,
        );
        let mut session = PrefsSession::open(&prefs);
        let mut native = RowSelection::default();
        assert_eq!(
            session.edit_selected_profile(&native),
            vec![SessionEvent::Notice(EDIT_NEEDS_ONE_ROW.to_owned())]
        );

        native.select_only(0);
        native.move_cursor(1, 2, true);
        assert_eq!(
            session.edit_selected_profile(&native),
            vec![SessionEvent::Notice(EDIT_NEEDS_ONE_ROW.to_owned())]
        );

        native.select_only(1);
        session.edit_selected_profile(&native);
        assert_eq!(session.editing_index(), Some(1));
        assert_eq!(session.profile_form().api_url, "https://b");
        assert!(session.profile_gate().state().is_unverified());
    }

    #[test]
    fn saving_an_edited_profile_appends_a_copy() {
        let prefs = MemoryPrefs::with_value(
            PrefKey::SavedConfigs,
            r#"[{"apiUrl":"https://a","apiKey":"k","model":"m1"}]"#,
        );
        let mut session = PrefsSession::open(&prefs);
        let mut native = RowSelection::default();
        native.select_only(0);
        session.edit_selected_profile(&native);
        verified_profile(&mut session);
        session.save_profile(&prefs);
        assert_eq!(session.profiles().len(), 2);
        assert_eq!(session.editing_index(), None);
    }

    #[test]
    fn persistence_failure_keeps_the_in_memory_change() {
        let storage = ReadOnlyPrefs;
        let mut session = PrefsSession::open(&storage);
        session.set_token_input("tok_abcdefgh");
        let (ticket, _) = session.begin_token_verify();
        session.finish_token_verify(ticket.token, &ok());

        let events = session.submit_token(&storage);
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::PersistFailed {
                form: FormKind::Token,
                ..
            }
        )));
        assert_eq!(session.tokens().len(), 1);
        assert!(session.status(FormKind::Token).contains("database is read-only"));
    }
}
