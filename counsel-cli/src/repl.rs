//! Single-question mode and the interactive REPL.

use counsel_core::{ChatEngine, TurnEvent, TurnRequest, TurnSummary};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::display::HtmlToTerminal;

/// Words that leave the REPL.
pub fn is_exit(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "quit" | "exit" | "bye"
    )
}

/// Stream one turn to stdout. Ctrl-C cancels the turn; `None` means it was
/// cancelled before finishing.
async fn stream_turn(
    engine: &Arc<ChatEngine>,
    request: TurnRequest,
) -> anyhow::Result<Option<TurnSummary>> {
    let cancel = CancellationToken::new();
    let mut stream = engine.handle_turn(request, cancel.clone());
    let mut renderer = HtmlToTerminal::new(io::stdout().is_terminal());
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(TurnEvent::Fragment(fragment))) => {
                    write!(stdout, "{}", renderer.fragment(&fragment))?;
                    stdout.flush()?;
                }
                Some(Ok(TurnEvent::Finished(summary))) => {
                    writeln!(stdout, "{}", renderer.flush())?;
                    debug!(
                        session_id = %summary.session_id,
                        cited = ?summary.cited_indices,
                        tools = summary.tool_invocations,
                        degradations = ?summary.degradations,
                        "Turn finished"
                    );
                    return Ok(Some(summary));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                writeln!(stdout, "\n[cancelled]")?;
                return Ok(None);
            }
        }
    }
}

/// Answer one question and exit.
pub async fn run_single(
    engine: Arc<ChatEngine>,
    template: TurnRequest,
    question: &str,
) -> anyhow::Result<()> {
    let request = TurnRequest {
        message: question.to_string(),
        ..template
    };
    stream_turn(&engine, request).await?;
    Ok(())
}

/// Read questions until EOF or an exit word. All turns share one session.
pub async fn run_interactive(engine: Arc<ChatEngine>, template: TurnRequest) -> anyhow::Result<()> {
    let session_id = template
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("Counsel: legal document assistant");
    println!("  Session: {session_id}");
    println!("  Type a question, or quit / exit / bye to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            println!("Goodbye!");
            break;
        }

        let request = TurnRequest {
            message: input.to_string(),
            session_id: Some(session_id.clone()),
            ..template.clone()
        };
        if let Err(e) = stream_turn(&engine, request).await {
            eprintln!("Error: {e}");
        }
        println!();
    }
    Ok(())
}
