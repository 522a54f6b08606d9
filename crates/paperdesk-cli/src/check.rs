// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use paperdesk_app::PrefKey;
use paperdesk_client::Client;
use paperdesk_db::Store;
use std::io::Write;

/// Writes the `--check` summary: every stored preference key, then whether
/// the controller answers. Fails when the controller cannot be reached.
pub fn report(store: &Store, client: &Client, out: &mut impl Write) -> Result<()> {
    let prefs = store.list_prefs()?;
    writeln!(out, "preferences: {} stored", prefs.len())?;
    for pref in &prefs {
        let note = if PrefKey::parse(&pref.key).is_some() {
            ""
        } else {
            " (unrecognized)"
        };
        writeln!(
            out,
            "  {} {} bytes, updated {}{note}",
            pref.key, pref.bytes, pref.updated_at
        )?;
    }

    client
        .ping()
        .with_context(|| format!("controller check failed for {}", client.base_url()))?;
    writeln!(out, "controller {}: reachable", client.base_url())?;
    tracing::info!(prefs = prefs.len(), controller = client.base_url(), "check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::report;
    use anyhow::Result;
    use paperdesk_client::Client;
    use paperdesk_db::Store;
    use paperdesk_testkit::{MockController, seed_demo};
    use std::time::Duration;

    fn seeded_store() -> Result<Store> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        seed_demo(&store, 3)?;
        Ok(store)
    }

    #[test]
    fn report_lists_stored_keys_and_pings_the_controller() -> Result<()> {
        let controller = MockController::start()?;
        let store = seeded_store()?;
        store.put_pref_raw("legacy.theme", "dark")?;
        let client = Client::new(controller.base_url(), Duration::from_secs(2))?;

        let mut out = Vec::new();
        report(&store, &client, &mut out)?;
        let text = String::from_utf8(out)?;

        assert!(text.contains("paperdesk.savedConfigs"), "{text}");
        assert!(text.contains("paperdesk.mineruTokens"), "{text}");
        assert!(text.contains("legacy.theme 4 bytes"), "{text}");
        assert!(text.contains("(unrecognized)"), "{text}");
        assert_eq!(text.matches("(unrecognized)").count(), 1, "{text}");
        assert!(
            text.contains(&format!("controller {}: reachable", controller.base_url())),
            "{text}"
        );
        assert!(
            controller
                .requests()
                .iter()
                .any(|request| request.method == "GET" && request.path == "/")
        );
        Ok(())
    }

    #[test]
    fn unreachable_controller_fails_the_check() -> Result<()> {
        let store = seeded_store()?;
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(200))?;

        let mut out = Vec::new();
        let error = report(&store, &client, &mut out).expect_err("closed port should fail");
        let message = format!("{error:#}");
        assert!(message.contains("controller check failed"), "{message}");
        assert!(message.contains("cannot reach"), "{message}");

        let text = String::from_utf8(out)?;
        assert!(text.starts_with("preferences: "), "{text}");
        Ok(())
    }
}
