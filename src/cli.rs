use std::io::{self, Write};
use std::thread;

use anyhow::Result;
use log::{debug, info, warn};

use crate::action::{ActionDispatcher, HostCommand};
use crate::dialogue::{DialogueEngine, EngineConfig, Selection, Speaker};
use crate::menu::{QuestionKind, Registry};
use crate::session::SessionData;

// ---------------------------------------------------------------------------
// Terminal input
// ---------------------------------------------------------------------------

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    /// 1-based position in the offered option list.
    Pick(usize),
    /// Option id typed out.
    OptionId(String),
    Back,
    Reset,
    /// Re-read the session file.
    Reload,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line.to_lowercase().as_str() {
        "b" | "back" => return Input::Back,
        "r" | "reset" => return Input::Reset,
        "l" | "reload" => return Input::Reload,
        "q" | "quit" | "exit" => return Input::Quit,
        _ => {}
    }
    match line.parse::<usize>() {
        Ok(n) => Input::Pick(n),
        Err(_) => Input::OptionId(line.to_string()),
    }
}

fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    let n = io::stdin().read_line(&mut input)?;
    // EOF
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

// ---------------------------------------------------------------------------
// Session end screen
// ---------------------------------------------------------------------------

/// How a chat session ended.
enum SessionEnd {
    /// The dialogue asked the host to close it.
    Closed { turns: usize },
    /// The user typed quit (or stdin closed).
    Quit,
}

fn show_session_end(end: &SessionEnd) {
    println!("\n========================================");
    println!("             CHAT CLOSED");
    println!("========================================");
    match end {
        SessionEnd::Closed { turns } => {
            println!("  The assistant closed the chat after {turns} message(s).");
        }
        SessionEnd::Quit => {
            println!("  You left the chat.");
        }
    }
    println!("========================================\n");
    println!("  [o] Open a new chat    [q] Quit\n");
}

/// Returns `true` to open a fresh chat, `false` to quit.
fn prompt_reopen() -> Result<bool> {
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(input) = read_line()? else {
            return Ok(false);
        };
        match input.trim().to_lowercase().as_str() {
            "o" => return Ok(true),
            "q" => return Ok(false),
            _ => println!("  Press [o] to open a new chat or [q] to quit."),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render whatever the engine has queued, with a typing pause first, and
/// print bot turns the user hasn't seen yet.
fn flush_bot_messages(engine: &mut DialogueEngine<'_>, printed: &mut usize) -> Result<()> {
    if engine.is_awaiting_render() {
        print!("(typing...)");
        io::stdout().flush()?;
        thread::sleep(engine.config().typing_delay);
        print!("\r           \r");
        engine.render_pending();
    }

    for entry in &engine.transcript()[*printed..] {
        if entry.speaker == Speaker::Bot {
            println!("\n{entry}");
        }
    }
    *printed = engine.transcript().len();
    Ok(())
}

fn show_options(engine: &DialogueEngine<'_>) {
    println!();
    if engine.current_question().kind == QuestionKind::Menu {
        println!("What would you like to do?");
    }
    for (i, option) in engine.offered_options().iter().enumerate() {
        println!("  [{}] {}", i + 1, option.display());
    }
    println!("  (b) back   (r) reset   (l) reload data   (q) quit");
}

/// Hand host commands to the "application". In a terminal there are no
/// views to open, so navigation is only announced.
fn handle_commands(engine: &mut DialogueEngine<'_>) -> bool {
    let mut closed = false;
    for command in engine.take_commands() {
        match command {
            HostCommand::Navigate { target } => {
                info!("Host navigation requested: {target}");
                match &engine.session().user {
                    Some(user) => println!("\n(Opening the '{target}' page for {}...)", user.name),
                    None => println!("\n(Opening the '{target}' page...)"),
                }
            }
            HostCommand::Close => closed = true,
        }
    }
    closed
}

// ---------------------------------------------------------------------------
// Single chat session
// ---------------------------------------------------------------------------

fn chat_session(
    registry: &Registry,
    dispatcher: &ActionDispatcher,
    session_path: Option<&str>,
    session: &SessionData,
    config: &EngineConfig,
) -> Result<SessionEnd> {
    let config = EngineConfig {
        auto_render: false,
        ..config.clone()
    };
    let mut engine = DialogueEngine::new(registry, dispatcher, session.clone(), config);
    let mut printed = 0;

    engine.open();

    loop {
        flush_bot_messages(&mut engine, &mut printed)?;

        if handle_commands(&mut engine) {
            return Ok(SessionEnd::Closed {
                turns: engine.transcript().len(),
            });
        }

        show_options(&engine);
        print!("\n[You]: ");
        io::stdout().flush()?;
        let Some(line) = read_line()? else {
            return Ok(SessionEnd::Quit);
        };

        let outcome = match parse_input(&line) {
            Input::Empty => {
                println!("(Pick an option number.)");
                continue;
            }
            Input::Quit => return Ok(SessionEnd::Quit),
            Input::Reset => {
                engine.reset();
                printed = 0;
                continue;
            }
            Input::Reload => {
                match session_path {
                    Some(path) => {
                        // A bad file keeps the chat going on the old data.
                        match SessionData::load(path) {
                            Ok(fresh) => {
                                engine.update_session(fresh);
                                println!("(Data reloaded from {path}.)");
                            }
                            Err(e) => {
                                warn!("Reload failed: {e:#}");
                                println!("(Couldn't reload {path}.)");
                            }
                        }
                    }
                    None => println!("(No session file to reload.)"),
                }
                continue;
            }
            Input::Back => engine.go_back(),
            Input::Pick(n) => {
                let picked = engine
                    .offered_options()
                    .get(n.wrapping_sub(1))
                    .map(|o| o.id.clone());
                match picked {
                    Some(id) => engine.select_option(&id),
                    None => Selection::Rejected,
                }
            }
            Input::OptionId(id) => engine.select_option(&id),
        };

        debug!(
            "Input outcome: {outcome:?} (now on '{}', history depth {})",
            engine.current_question_id(),
            engine.history().len()
        );
        if outcome == Selection::Rejected {
            println!("(That option isn't available here.)");
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point. Opens chats in a loop until the user quits.
// ---------------------------------------------------------------------------

pub fn run(
    registry: &Registry,
    dispatcher: &ActionDispatcher,
    session_path: Option<&str>,
    session: SessionData,
    config: EngineConfig,
) -> Result<()> {
    loop {
        println!("\n========================================");
        println!("        HOSPITAL ASSISTANT CHAT");
        println!("========================================");
        println!("Pick an option by number.\n");

        let end = chat_session(registry, dispatcher, session_path, &session, &config)?;
        show_session_end(&end);

        if !prompt_reopen()? {
            println!("Goodbye!");
            break;
        }

        info!("User opened a new chat");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_commands() {
        assert_eq!(parse_input("  b \n"), Input::Back);
        assert_eq!(parse_input("BACK"), Input::Back);
        assert_eq!(parse_input("r"), Input::Reset);
        assert_eq!(parse_input("reload"), Input::Reload);
        assert_eq!(parse_input("exit"), Input::Quit);
        assert_eq!(parse_input("\n"), Input::Empty);
    }

    #[test]
    fn test_parse_input_options() {
        assert_eq!(parse_input("3\n"), Input::Pick(3));
        assert_eq!(parse_input("pay_bill"), Input::OptionId("pay_bill".into()));
    }
}
