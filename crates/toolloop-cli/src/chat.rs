//! Question/answer loop on the terminal

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use toolloop_core::{Agent, CancellationToken, ConversationHistory, ConversationTurn, SessionEvent, SessionOutcome, ToolOutcome};

/// Inputs that end the interactive loop
const QUIT_WORDS: [&str; 4] = ["quit", "q", "exit", "退出"];

pub fn is_quit(input: &str) -> bool {
    QUIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

/// Read questions from stdin until a quit word or EOF
pub async fn interactive(agent: &Agent) -> anyhow::Result<()> {
    println!("toolloop ready. Type 'quit' to exit, Ctrl-C cancels a running answer.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history = agent.initial_history();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_quit(input) {
            break;
        }

        history = ask(agent, history, input).await.into_history();
    }

    println!("Bye.");
    Ok(())
}

/// Run one question on top of `history`, printing progress as it happens
pub async fn ask(agent: &Agent, mut history: ConversationHistory, question: &str) -> SessionOutcome {
    history.push(ConversationTurn::user(question));

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = agent.run_with_history(history, cancel.clone(), Some(tx));
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => print_event(&event),
            outcome = &mut run => {
                while let Ok(event) = rx.try_recv() {
                    print_event(&event);
                }
                break outcome;
            }
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() && !cancel.is_cancelled() {
                    eprintln!("\n[cancelling]");
                    cancel.cancel();
                }
            }
        }
    };

    match &outcome {
        SessionOutcome::Done { .. } => println!(),
        SessionOutcome::Aborted { reason, .. } => eprintln!("\n[aborted] {}", reason),
    }
    outcome
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::TextDelta(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        SessionEvent::ToolCallStarted { id, name } => eprintln!("\n[tool] {} ({})", name, id),
        SessionEvent::ToolCallFinished(result) => match &result.outcome {
            ToolOutcome::Success { .. } => eprintln!("[tool] {} ok", result.call_id),
            ToolOutcome::Failure(failure) => {
                eprintln!("[tool] {} failed ({}): {}", result.call_id, failure.kind, failure.message)
            }
        },
        SessionEvent::PhaseChanged(phase) => tracing::debug!(%phase, "Phase changed"),
    }
}
