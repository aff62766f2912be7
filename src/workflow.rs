use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, SubtransError};
use crate::pipeline::{RunReport, TranslationPipeline};
use crate::progress::{BarReporter, ConsoleWriter, LogReporter, ProgressReporter};
use crate::subtitle::SubtitleDocument;
use crate::translate::{CompletionClient, TranslationProvider};

/// Document-level orchestration: load, translate, write.
pub struct Workflow {
    config: Config,
    show_progress: bool,
    interrupt: Option<CancellationToken>,
    console: Option<ConsoleWriter>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            show_progress: false,
            interrupt: None,
            console: None,
        })
    }

    /// Draw a terminal progress bar instead of logging each block.
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Console log writer to keep clear of the progress bar.
    pub fn with_console(mut self, console: ConsoleWriter) -> Self {
        self.console = Some(console);
        self
    }

    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate a subtitle file.
    ///
    /// The output is written once, after every block has been processed; a
    /// decoding failure or an interrupt leaves no output file behind.
    pub async fn translate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        client: &dyn CompletionClient,
        input_path: P,
        output_path: Q,
    ) -> Result<RunReport> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!("Translating subtitles: {} -> {}", input_path.display(), output_path.display());

        let candidates = self.config.subtitle.candidate_encodings()?;
        let mut document = SubtitleDocument::load(input_path, &candidates).await?;

        let reporter: Box<dyn ProgressReporter> = if self.show_progress {
            let bar = BarReporter::new(document.len());
            match &self.console {
                Some(console) => Box::new(bar.with_console(console.clone())),
                None => Box::new(bar),
            }
        } else {
            Box::new(LogReporter)
        };

        let mut pipeline = TranslationPipeline::new(TranslationProvider::from_config(&self.config.translate)?)
            .with_block_delay(self.config.translate.block_delay())
            .with_reporter(reporter);
        if let Some(token) = &self.interrupt {
            pipeline = pipeline.with_interrupt(token.clone());
        }

        let report = pipeline.run(&mut document, client).await?;
        document.write_to(output_path).await?;

        Ok(report)
    }

    /// Send a short test prompt to verify the client works.
    pub async fn check_connection(&self, client: &dyn CompletionClient) -> Result<()> {
        info!("Testing connection to {}", client.describe());
        client
            .check_connection()
            .await
            .map_err(|e| SubtransError::Config(format!("Connection test failed: {}", e)))?;
        info!("Connection to {} succeeded", client.describe());
        Ok(())
    }
}
