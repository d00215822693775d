//! Deterministic service doubles for tests, benches and offline runs.
//!
//! [`ScriptedGenerator`] answers by prompt substring, [`KeywordEmbedder`]
//! produces bag-of-words vectors so related texts actually score as related.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LlmError;
use crate::service::{EmbeddingService, TextGenerationService};

struct Rule {
    needle: String,
    replies: VecDeque<String>,
}

/// A text generator that answers from a script.
///
/// Rules are checked in registration order; the first rule whose needle
/// occurs in the prompt answers. A rule registered with [`Self::on`] always
/// returns the same reply; one registered with [`Self::on_sequence`] pops
/// its replies in order and then keeps returning the last one.
pub struct ScriptedGenerator {
    rules: Mutex<Vec<Rule>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl ScriptedGenerator {
    /// Create a generator whose unmatched prompts get `fallback`.
    #[must_use]
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: fallback.into(),
            prompts: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Answer prompts containing `needle` with `reply`.
    #[must_use]
    pub fn on(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.lock().push(Rule {
            needle: needle.into(),
            replies: VecDeque::from([reply.into()]),
        });
        self
    }

    /// Answer prompts containing `needle` with `replies`, one per call.
    #[must_use]
    pub fn on_sequence<I, S>(self, needle: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.lock().push(Rule {
            needle: needle.into(),
            replies: replies.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Fail every prompt containing `needle` with [`LlmError::Unavailable`].
    #[must_use]
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Every prompt received so far, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of received prompts containing `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.prompts.lock().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());

        if let Some(needle) = &self.fail_on {
            if prompt.contains(needle.as_str()) {
                return Err(LlmError::Unavailable(format!("scripted failure on '{needle}'")));
            }
        }

        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if !prompt.contains(rule.needle.as_str()) {
                continue;
            }
            let reply = if rule.replies.len() > 1 {
                rule.replies.pop_front()
            } else {
                rule.replies.front().cloned()
            };
            return Ok(reply.unwrap_or_else(|| self.fallback.clone()));
        }
        Ok(self.fallback.clone())
    }
}

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// `dimensions` buckets.
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
    dimensions: usize,
}

impl KeywordEmbedder {
    /// Create an embedder producing `dimensions`-wide vectors.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    /// Embed synchronously.
    #[must_use]
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0_f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            out[bucket] += 1.0;
        }
        out
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.vector(text))
    }
}
