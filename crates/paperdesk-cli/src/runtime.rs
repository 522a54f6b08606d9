// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use paperdesk_app::{
    PrefsStorage, ProfileSnapshot, ProfileVerifyTicket, RecognitionRequest, SubmissionReply,
    TokenVerifyTicket, VerifyReply,
};
use paperdesk_client::Client;
use paperdesk_db::Store;
use paperdesk_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;

/// Bridges the sqlite store and the controller client into the TUI. Network
/// calls run on worker threads and report back over the event channel.
pub struct DbRuntime<'a> {
    store: &'a Store,
    client: Client,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store, client: Client) -> Self {
        Self { store, client }
    }
}

impl paperdesk_tui::AppRuntime for DbRuntime<'_> {
    fn prefs(&self) -> &dyn PrefsStorage {
        self.store
    }

    fn verify_profile(&mut self, snapshot: &ProfileSnapshot) -> VerifyReply {
        self.client.verify_profile(snapshot)
    }

    fn verify_token(&mut self, token: &str) -> VerifyReply {
        self.client.verify_token(token)
    }

    fn start_recognition(&mut self, request: &RecognitionRequest) -> SubmissionReply {
        self.client.start_recognition(request)
    }

    fn spawn_profile_verify(
        &mut self,
        ticket: ProfileVerifyTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::spawn(move || {
            let reply = client.verify_profile(&ticket.snapshot);
            // Receiver is gone once the UI exits.
            let _ = tx.send(InternalEvent::ProfileVerified {
                fingerprint: ticket.fingerprint,
                reply,
            });
        });
        Ok(())
    }

    fn spawn_token_verify(
        &mut self,
        ticket: TokenVerifyTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::spawn(move || {
            let reply = client.verify_token(&ticket.token);
            let _ = tx.send(InternalEvent::TokenVerified {
                token: ticket.token,
                reply,
            });
        });
        Ok(())
    }

    fn spawn_recognition(
        &mut self,
        request: RecognitionRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::spawn(move || {
            let reply = client.start_recognition(&request);
            let _ = tx.send(InternalEvent::RecognitionFinished { reply });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DbRuntime;
    use anyhow::Result;
    use paperdesk_app::{PrefKey, PrefsStorage, RecognitionPage, SubmissionReply, VerifyReply};
    use paperdesk_client::Client;
    use paperdesk_db::Store;
    use paperdesk_testkit::{MockController, seed_demo};
    use paperdesk_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::time::Duration;

    fn runtime_parts(controller: &MockController) -> Result<(Store, Client)> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        seed_demo(&store, 5)?;
        let client = Client::new(controller.base_url(), Duration::from_secs(2))?;
        Ok((store, client))
    }

    #[test]
    fn prefs_reads_through_to_the_store() -> Result<()> {
        let controller = MockController::start()?;
        let (store, client) = runtime_parts(&controller)?;
        let runtime = DbRuntime::new(&store, client);
        assert_eq!(
            runtime.prefs().get_pref(PrefKey::WindowHours)?.as_deref(),
            Some("24")
        );
        Ok(())
    }

    #[test]
    fn spawned_token_verify_reports_over_the_channel() -> Result<()> {
        let controller = MockController::start()?;
        let (store, client) = runtime_parts(&controller)?;
        let mut runtime = DbRuntime::new(&store, client);
        let (tx, rx) = mpsc::channel();

        runtime.spawn_token_verify(
            paperdesk_app::TokenVerifyTicket {
                token: "short".to_owned(),
            },
            tx,
        )?;
        let event = rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(
            event,
            InternalEvent::TokenVerified {
                token: "short".to_owned(),
                reply: VerifyReply::Answered {
                    code: 422,
                    message: "Token is too short".to_owned(),
                },
            }
        );
        Ok(())
    }

    #[test]
    fn spawned_recognition_reports_the_task() -> Result<()> {
        let controller = MockController::start()?;
        let (store, client) = runtime_parts(&controller)?;
        let mut runtime = DbRuntime::new(&store, client);
        let page = RecognitionPage::open(&store, &[]);
        let (tx, rx) = mpsc::channel();

        runtime.spawn_recognition(page.build_request(), tx)?;
        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::RecognitionFinished {
                reply: SubmissionReply::Accepted { task_id, .. },
            } => assert_eq!(task_id.as_deref(), Some("recognition_1")),
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }
}
