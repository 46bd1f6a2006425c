//! Typist-style pacing between reveal chunks.

use std::time::Duration;

use anyhow::{Result, bail};

use super::chunk::Chunk;

/// Pause class of the last character in a revealed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseClass {
    SentenceEnd,
    Clause,
    Default,
    Whitespace,
}

impl PauseClass {
    pub fn of(ch: char) -> Self {
        match ch {
            '.' | '!' | '?' | '…' => PauseClass::SentenceEnd,
            ',' | ';' | ':' => PauseClass::Clause,
            c if c.is_whitespace() => PauseClass::Whitespace,
            _ => PauseClass::Default,
        }
    }
}

/// Delays applied after each revealed chunk.
///
/// `sentence_pause` and `clause_pause` extend `base`; `whitespace` replaces
/// it and must be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub base: Duration,
    pub sentence_pause: Duration,
    pub clause_pause: Duration,
    pub whitespace: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(Self::DEFAULT_BASE_MS),
            sentence_pause: Duration::from_millis(Self::DEFAULT_SENTENCE_PAUSE_MS),
            clause_pause: Duration::from_millis(Self::DEFAULT_CLAUSE_PAUSE_MS),
            whitespace: Duration::from_millis(Self::DEFAULT_WHITESPACE_MS),
        }
    }
}

impl Pacing {
    pub const DEFAULT_BASE_MS: u64 = 14;
    pub const DEFAULT_SENTENCE_PAUSE_MS: u64 = 180;
    pub const DEFAULT_CLAUSE_PAUSE_MS: u64 = 70;
    pub const DEFAULT_WHITESPACE_MS: u64 = 6;

    /// No delays at all.
    pub fn instant() -> Self {
        Self {
            base: Duration::ZERO,
            sentence_pause: Duration::ZERO,
            clause_pause: Duration::ZERO,
            whitespace: Duration::ZERO,
        }
    }

    pub fn from_millis(base: u64, sentence_pause: u64, clause_pause: u64, whitespace: u64) -> Self {
        Self {
            base: Duration::from_millis(base),
            sentence_pause: Duration::from_millis(sentence_pause),
            clause_pause: Duration::from_millis(clause_pause),
            whitespace: Duration::from_millis(whitespace),
        }
    }

    pub fn is_instant(&self) -> bool {
        *self == Self::instant()
    }

    /// Checks sentence end > clause > default > whitespace.
    ///
    /// # Errors
    /// Returns an error describing the first violated ordering.
    pub fn validate(&self) -> Result<()> {
        if self.is_instant() {
            return Ok(());
        }
        if self.sentence_pause <= self.clause_pause {
            bail!("sentence pause must be longer than clause pause");
        }
        if self.clause_pause.is_zero() {
            bail!("clause pause must be greater than zero");
        }
        if self.whitespace >= self.base {
            bail!("whitespace delay must be shorter than the base delay");
        }
        Ok(())
    }

    pub fn delay_for(&self, class: PauseClass) -> Duration {
        match class {
            PauseClass::SentenceEnd => self.base + self.sentence_pause,
            PauseClass::Clause => self.base + self.clause_pause,
            PauseClass::Default => self.base,
            PauseClass::Whitespace => self.whitespace,
        }
    }

    pub fn delay_after_char(&self, ch: char) -> Duration {
        self.delay_for(PauseClass::of(ch))
    }

    /// Delay after a chunk; structural chunks never wait.
    pub fn delay_after(&self, chunk: &Chunk) -> Duration {
        chunk
            .text()
            .and_then(|text| text.chars().next_back())
            .map_or(Duration::ZERO, |ch| self.delay_after_char(ch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragment;
    use crate::reveal::chunk::{ChunkPolicy, flatten};

    #[test]
    fn test_default_pacing_is_valid() {
        Pacing::default().validate().unwrap();
        Pacing::instant().validate().unwrap();
    }

    #[test]
    fn test_pause_ordering_over_sample_sentence() {
        let pacing = Pacing::default();
        let chunks = flatten(
            &Fragment::plain("Pause. Then, continue!"),
            ChunkPolicy::PerGrapheme,
        );
        let delay_of = |needle: &str| {
            chunks
                .iter()
                .find(|c| c.text() == Some(needle))
                .map(|c| pacing.delay_after(c))
                .unwrap()
        };

        let period = delay_of(".");
        let bang = delay_of("!");
        let comma = delay_of(",");
        let letter = delay_of("P");
        let space = delay_of(" ");

        assert_eq!(period, bang);
        assert!(period > comma);
        assert!(comma > letter);
        assert!(letter > space);
    }

    #[test]
    fn test_validate_rejects_inverted_ordering() {
        let pacing = Pacing::from_millis(10, 50, 80, 5);
        assert!(pacing.validate().is_err());
        let pacing = Pacing::from_millis(10, 80, 50, 20);
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn test_structural_chunks_do_not_wait() {
        let chunk = Chunk::Open {
            path: vec![0],
            tag: crate::fragment::Tag::Paragraph,
        };
        assert_eq!(Pacing::default().delay_after(&chunk), Duration::ZERO);
    }
}
