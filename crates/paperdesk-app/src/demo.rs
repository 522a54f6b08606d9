// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deterministic sample preferences for `--demo` sessions and tests.

use crate::{ApiProfile, ApiToken, ArxivClass, PrefKey, PrefsStorage, PromptEntry};
use anyhow::{Context, Result};
use serde::Serialize;

const PROVIDERS: [(&str, &str); 4] = [
    ("https://api.deepseek.com/v1/chat/completions", "deepseek-chat"),
    ("https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions", "qwen-plus"),
    ("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
    ("http://127.0.0.1:11434/v1/chat/completions", "qwen3:8b"),
];

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const ARXIV_CLASSES: [(&str, &str); 3] = [
    ("Artificial Intelligence", "cs.AI | cs.LG"),
    ("Computer Vision", "cs.CV"),
    ("Computation and Language", "cs.CL"),
];

const INSTRUCTION_PROMPTS: [(&str, &str); 2] = [
    (
        "relevance",
        "Decide whether the paper is relevant to retrieval-augmented generation.",
    ),
    (
        "methods",
        "Keep papers that introduce a new training method or dataset.",
    ),
];

const SUMMARY_PROMPTS: [(&str, &str); 2] = [
    ("one-line", "Summarize the contribution in one sentence."),
    (
        "structured",
        "Summarize problem, method, results, and limitations as bullet points.",
    ),
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for plausible profiles and tokens.
#[derive(Debug, Clone)]
pub struct PaperFaker {
    rng: DeterministicRng,
}

impl PaperFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn profile(&mut self) -> ApiProfile {
        let (api_url, model) = PROVIDERS[self.rng.int_n(PROVIDERS.len())];
        ApiProfile {
            api_type: "full_url".to_owned(),
            api_url: api_url.to_owned(),
            api_key: format!("sk-{}", self.secret(24)),
            model: model.to_owned(),
            temperature: [0.2, 0.7, 1.0][self.rng.int_n(3)],
            max_tokens: [4096, 8192, 32768][self.rng.int_n(3)],
            related_number: 5 + self.rng.int_n(16) as i64,
        }
    }

    /// Token text that passes the controller's verification rules.
    pub fn token(&mut self) -> String {
        self.secret(32)
    }

    fn secret(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| TOKEN_ALPHABET[self.rng.int_n(TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

/// Writes demo lists for every persisted key.
pub fn seed_demo(storage: &dyn PrefsStorage, seed: u64) -> Result<()> {
    let mut faker = PaperFaker::new(seed);
    let profiles: Vec<ApiProfile> = (0..3).map(|_| faker.profile()).collect();
    let tokens: Vec<ApiToken> = (0..2)
        .filter_map(|_| ApiToken::new(&faker.token()))
        .collect();
    let classes: Vec<ArxivClass> = ARXIV_CLASSES
        .iter()
        .map(|(name, description)| ArxivClass {
            name: (*name).to_owned(),
            description: (*description).to_owned(),
        })
        .collect();

    write_json(storage, PrefKey::SavedConfigs, &profiles)?;
    write_json(storage, PrefKey::MineruTokens, &tokens)?;
    write_json(storage, PrefKey::ArxivClasses, &classes)?;
    write_json(
        storage,
        PrefKey::InstructionPrompts,
        &prompt_entries(&INSTRUCTION_PROMPTS),
    )?;
    write_json(
        storage,
        PrefKey::SummaryPrompts,
        &prompt_entries(&SUMMARY_PROMPTS),
    )?;
    storage
        .set_pref(PrefKey::WindowHours, "24")
        .context("seed window hours")?;
    tracing::debug!(seed, "demo preferences seeded");
    Ok(())
}

fn prompt_entries(entries: &[(&str, &str)]) -> Vec<PromptEntry> {
    entries
        .iter()
        .map(|(name, content)| PromptEntry {
            name: (*name).to_owned(),
            content: (*content).to_owned(),
        })
        .collect()
}

fn write_json<T: Serialize>(
    storage: &dyn PrefsStorage,
    key: PrefKey,
    value: &T,
) -> Result<()> {
    let encoded =
        serde_json::to_string(value).with_context(|| format!("encode {}", key.as_str()))?;
    storage
        .set_pref(key, &encoded)
        .with_context(|| format!("seed {}", key.as_str()))
}

#[cfg(test)]
mod tests {
    use super::{PaperFaker, TOKEN_ALPHABET, seed_demo};
    use crate::{MemoryPrefs, PrefKey, PrefsSession, RecognitionPage};
    use anyhow::Result;

    #[test]
    fn faker_is_deterministic_per_seed() {
        let mut left = PaperFaker::new(7);
        let mut right = PaperFaker::new(7);
        assert_eq!(left.profile(), right.profile());
        assert_eq!(left.token(), right.token());

        let mut other = PaperFaker::new(8);
        assert_ne!(PaperFaker::new(7).token(), other.token());
    }

    #[test]
    fn tokens_use_the_alphanumeric_alphabet() {
        let mut faker = PaperFaker::new(3);
        let token = faker.token();
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|byte| TOKEN_ALPHABET.contains(&byte)));
    }

    #[test]
    fn seeded_demo_loads_into_a_session() -> Result<()> {
        let prefs = MemoryPrefs::new();
        seed_demo(&prefs, 1)?;
        let session = PrefsSession::open(&prefs);
        assert_eq!(session.profiles().len(), 3);
        assert_eq!(session.tokens().len(), 2);

        let page = RecognitionPage::open(&prefs, session.profiles());
        assert_eq!(page.classes.len(), 3);
        assert_eq!(page.window_hours(), "24");
        assert!(page.model().is_some());
        assert!(prefs.raw(PrefKey::Model).is_some());
        Ok(())
    }
}
