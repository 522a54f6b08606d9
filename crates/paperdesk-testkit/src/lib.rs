// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod controller;

pub use controller::{MockController, RecordedRequest, verify_profile_rules, verify_token_rules};
pub use paperdesk_app::{PaperFaker, seed_demo};

use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("paperdesk.db");
    Ok((dir, db_path))
}

#[cfg(test)]
mod tests {
    use super::{PaperFaker, verify_token_rules};

    #[test]
    fn generated_tokens_pass_verification() {
        let mut faker = PaperFaker::new(11);
        for _ in 0..20 {
            let token = faker.token();
            assert_eq!(verify_token_rules(&token).0, 200);
        }
    }
}
