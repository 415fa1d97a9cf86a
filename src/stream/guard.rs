//! Misfiled-reasoning guard.
//!
//! Some OpenAI-compatible upstreams stream chain-of-thought through the
//! regular content channel, wrapped in a marker such as `<think>`. The guard
//! watches the start of the content channel and aborts the stream before any
//! of it is shown.
use smallvec::SmallVec;

/// Prefix used when the caller enables the guard without configuring any.
pub const DEFAULT_PREFIX: &str = "<think>";

/// Outcome of checking the accumulated content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Content is safe to surface. The guard is now disarmed.
    Pass,
    /// Too little content to decide; keep it back and wait.
    Hold,
    /// Content opens with the given prefix.
    Abort(String),
}

#[derive(Debug, Clone)]
pub struct MisfiledReasoningGuard {
    prefixes: SmallVec<[String; 1]>,
    armed: bool,
}

impl MisfiledReasoningGuard {
    /// Build a guard. Prefixes are trimmed and lower-cased; blank ones are
    /// dropped, and an empty set falls back to [`DEFAULT_PREFIX`].
    #[must_use]
    pub fn new<'a, I>(enabled: bool, prefixes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut normalized: SmallVec<[String; 1]> = prefixes
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if normalized.is_empty() {
            normalized.push(DEFAULT_PREFIX.to_string());
        }
        Self {
            prefixes: normalized,
            armed: enabled,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false, std::iter::empty())
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Switch the guard off for the rest of the stream.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Check the content accumulated so far.
    pub fn check(&mut self, accumulated: &str) -> GuardVerdict {
        if !self.armed {
            return GuardVerdict::Pass;
        }
        let normalized = accumulated.trim_start().to_lowercase();
        if let Some(prefix) = self
            .prefixes
            .iter()
            .find(|prefix| normalized.starts_with(prefix.as_str()))
        {
            self.armed = false;
            return GuardVerdict::Abort(prefix.clone());
        }
        if self
            .prefixes
            .iter()
            .any(|prefix| prefix.starts_with(normalized.as_str()))
        {
            return GuardVerdict::Hold;
        }
        self.armed = false;
        GuardVerdict::Pass
    }
}
