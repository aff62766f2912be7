use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SubtransError};
use crate::progress::{LogReporter, Progress, ProgressReporter};
use crate::subtitle::{SubtitleBlock, SubtitleDocument};
use crate::translate::{CompletionClient, TranslationProvider};

/// Lifecycle of a single block during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Pending,
    Translating,
    Translated,
    /// Translation failed; the source text was kept
    FallbackOriginal,
    /// Malformed block, never sent for translation
    Skipped,
}

impl BlockState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Translated | Self::FallbackOriginal | Self::Skipped)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Translating => "translating",
            Self::Translated => "translated",
            Self::FallbackOriginal => "fallback",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// What happened to one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutcome {
    /// 0-based position in the document
    pub position: usize,
    /// Index label of the block, if it was well-formed
    pub index: Option<String>,
    pub state: BlockState,
    /// Provider attempts spent on this block
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub translated: usize,
    pub fallback: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.translated + self.fallback + self.skipped
    }

    fn record(&mut self, state: BlockState) {
        match state {
            BlockState::Translated => self.translated += 1,
            BlockState::FallbackOriginal => self.fallback += 1,
            BlockState::Skipped => self.skipped += 1,
            BlockState::Pending | BlockState::Translating => {}
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} translated, {} fell back to original, {} skipped (of {} blocks)",
            self.translated,
            self.fallback,
            self.skipped,
            self.total()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<BlockOutcome>,
    pub summary: Summary,
}

/// Drives the sequential per-block translation of a document.
pub struct TranslationPipeline {
    provider: TranslationProvider,
    block_delay: Duration,
    reporter: Box<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl TranslationPipeline {
    pub fn new(provider: TranslationProvider) -> Self {
        Self {
            provider,
            block_delay: Duration::ZERO,
            reporter: Box::new(LogReporter),
            cancel: CancellationToken::new(),
        }
    }

    /// Pause between consecutive provider calls.
    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = delay;
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Abort the run once `token` is cancelled, including mid-request and
    /// mid-retry.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn interrupted(&self, completed: usize, total: usize) -> SubtransError {
        warn!("Interrupted after {} of {} blocks", completed, total);
        SubtransError::Interrupted { completed, total }
    }

    /// Translate every well-formed block of `document` in place.
    ///
    /// Block failures fall back to the source text and never abort the run;
    /// the only error is an interrupt, after which the document must not be
    /// written.
    pub async fn run(
        &self,
        document: &mut SubtitleDocument,
        client: &dyn CompletionClient,
    ) -> Result<RunReport> {
        let total = document.len();
        let mut report = RunReport::default();
        let mut called_provider = false;

        info!(
            "Translating {} blocks to {} via {}",
            total,
            self.provider.target_language(),
            client.describe()
        );

        for (position, block) in document.blocks.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.interrupted(position, total));
            }

            let outcome = match block {
                SubtitleBlock::Malformed(_) => {
                    warn!("Block {} is malformed, passing it through", position + 1);
                    BlockOutcome {
                        position,
                        index: None,
                        state: BlockState::Skipped,
                        attempts: 0,
                        error: None,
                    }
                }
                SubtitleBlock::Entry(entry) => {
                    if called_provider && !self.block_delay.is_zero() {
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Err(self.interrupted(position, total)),
                            _ = tokio::time::sleep(self.block_delay) => {}
                        }
                    }
                    called_provider = true;

                    let mut outcome = BlockOutcome {
                        position,
                        index: Some(entry.index.clone()),
                        state: BlockState::Translating,
                        attempts: 0,
                        error: None,
                    };
                    debug!("Block {} (index {}): {} -> {}", position + 1, entry.index, BlockState::Pending, outcome.state);

                    match self.provider.translate(client, &entry.text(), &self.cancel).await {
                        Ok(translation) => {
                            outcome.attempts = translation.attempts;
                            if entry.set_text(&translation.text) {
                                outcome.state = BlockState::Translated;
                            } else {
                                outcome.state = BlockState::FallbackOriginal;
                                outcome.error = Some("translation contained no text".to_string());
                            }
                        }
                        Err(e) if e.is_cancelled() => {
                            return Err(self.interrupted(position, total));
                        }
                        Err(e) => {
                            warn!(
                                "Block {} (index {}) kept its original text: {}",
                                position + 1,
                                entry.index,
                                e
                            );
                            outcome.attempts = e.attempts();
                            outcome.state = BlockState::FallbackOriginal;
                            outcome.error = Some(e.to_string());
                        }
                    }
                    outcome
                }
            };

            report.summary.record(outcome.state);
            self.reporter.report(
                Progress {
                    current: position + 1,
                    total,
                },
                outcome.state,
            );
            report.outcomes.push(outcome);
        }

        self.reporter.finish();
        info!("Translation finished: {}", report.summary);
        Ok(report)
    }
}
