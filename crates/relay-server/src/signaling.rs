//! Offer intake for the relay binary
//!
//! Offers arrive as base64 payloads, either from files or one per line on
//! standard input. Each answer is written back as a single base64 line.

use crate::sfu::Orchestrator;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Where offers come from
#[derive(Debug, Clone)]
pub enum OfferSource {
    /// Each file holds one offer; files are answered in order with `interval` between them
    Files {
        paths: Vec<PathBuf>,
        interval: Duration,
    },
    /// One offer per line until end of input
    Stdin,
}

/// Answer every offer from `source`, writing answers to `out`
///
/// A bad offer is logged and skipped; it never stops the remaining ones.
/// Returns the number of offers that were answered.
pub async fn run<W>(orchestrator: &Orchestrator, source: &OfferSource, out: &mut W) -> anyhow::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    match source {
        OfferSource::Files { paths, interval } => {
            let mut answered = 0;
            for (i, path) in paths.iter().enumerate() {
                if i > 0 && !interval.is_zero() {
                    tokio::time::sleep(*interval).await;
                }
                match read_offer_file(path).await {
                    Ok(payload) => {
                        if answer_one(orchestrator, &payload, out).await? {
                            answered += 1;
                        }
                    }
                    Err(e) => tracing::error!("Failed to read offer {}: {}", path.display(), e),
                }
            }
            Ok(answered)
        }
        OfferSource::Stdin => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            answer_lines(orchestrator, stdin, out).await
        }
    }
}

/// Answer one offer per non-blank line of `reader`
pub async fn answer_lines<R, W>(orchestrator: &Orchestrator, reader: R, out: &mut W) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if answer_one(orchestrator, &line, out).await? {
            answered += 1;
        }
    }

    Ok(answered)
}

async fn read_offer_file(path: &Path) -> std::io::Result<String> {
    let payload = tokio::fs::read_to_string(path).await?;
    if payload.trim().is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "offer file is empty",
        ));
    }
    Ok(payload)
}

/// Returns false when the offer was rejected; only output errors are fatal
async fn answer_one<W>(orchestrator: &Orchestrator, payload: &str, out: &mut W) -> anyhow::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    match orchestrator.handle_encoded_offer(payload).await {
        Ok(answer) => {
            out.write_all(answer.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!("Rejected offer: {}", e);
            Ok(false)
        }
    }
}
