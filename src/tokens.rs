//! Tokenizer plumbing shared by truncation and usage accounting.
//!
//! Encodings are loaded once per process; the gpt-4o family uses the o200k
//! vocabulary, everything else falls back to cl100k as a close-enough
//! approximation for counting and truncation.

use crate::extractor::Backend;
use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;
use tracing::warn;

fn cl100k() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
    ENCODER.get_or_init(|| {
        tiktoken_rs::cl100k_base().expect("Failed to load cl100k_base encoding")
    })
}

fn o200k() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
    ENCODER.get_or_init(|| {
        tiktoken_rs::o200k_base().expect("Failed to load o200k_base encoding")
    })
}

pub fn encoding_for(backend: Backend) -> &'static CoreBPE {
    match backend {
        Backend::Gpt4oMini | Backend::Gpt4o => o200k(),
        Backend::Gemini15Flash | Backend::LocalLlama8b | Backend::GroqLlama70b => cl100k(),
    }
}

pub fn count_tokens(text: &str, backend: Backend) -> u64 {
    encoding_for(backend).encode_with_special_tokens(text).len() as u64
}

/// Deterministic prefix truncation: keeps the leading `max_tokens` tokens and
/// drops the remainder. Text already under the limit is returned unchanged.
pub fn truncate_to_token_limit(text: &str, backend: Backend, max_tokens: usize) -> String {
    let encoder = encoding_for(backend);
    let encoded = encoder.encode_with_special_tokens(text);
    if encoded.len() <= max_tokens {
        return text.to_string();
    }

    match encoder.decode(encoded[..max_tokens].to_vec()) {
        Ok(prefix) => prefix,
        Err(e) => {
            warn!(error = %e, "Token decode failed, returning untruncated text");
            text.to_string()
        }
    }
}
