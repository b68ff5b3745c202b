use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::error::AppError;

/// What to do about the output path before downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDecision {
    Proceed,
    Abort,
}

/// Decides whether the download may write to `path`. An existing file is
/// removed when the user agrees (or `assume_yes` is set), since output is
/// appended.
pub async fn prepare_output(path: &Path, assume_yes: bool) -> Result<OutputDecision, AppError> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(OutputDecision::Proceed);
    }

    let overwrite = if assume_yes {
        true
    } else {
        let question = format!("File «{}» already exists! Rewrite? (y/N) ", path.display());
        ask(&question).await?
    };

    if !overwrite {
        return Ok(OutputDecision::Abort);
    }

    info!(path = %path.display(), "Removing existing output file");
    tokio::fs::remove_file(path).await?;
    Ok(OutputDecision::Proceed)
}

async fn ask(question: &str) -> Result<bool, AppError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim_start().chars().next(), Some('y' | 'Y'))
}
