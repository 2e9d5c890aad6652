// UI layer: the line-oriented command loop and the prompt abstraction it
// reads from. Interactive input goes through `dialoguer`; everything the
// user sees is printed through the same `Prompt` so the loop can be driven
// from a script in tests.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Input;
use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::debug;

use crate::api::TrackClient;
use crate::config::{CredentialStore, Credentials, Settings};
use crate::interrupt::{Interrupt, FAREWELL};

const RULE: &str = "==================================================";

/// Source of user input and sink for user-facing messages.
pub trait Prompt {
    /// Ask for one line of input. The answer is returned untrimmed.
    fn ask(&mut self, message: &str) -> io::Result<String>;

    /// Show a message to the user.
    fn say(&mut self, message: &str);
}

impl<P: Prompt + ?Sized> Prompt for &mut P {
    fn ask(&mut self, message: &str) -> io::Result<String> {
        (**self).ask(message)
    }

    fn say(&mut self, message: &str) {
        (**self).say(message)
    }
}

/// Prompt on the real terminal. Uses `dialoguer` when stdin is a tty and
/// plain line reads otherwise, so input can also be piped in.
pub struct TerminalPrompt {
    interactive: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        TerminalPrompt {
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for TerminalPrompt {
    fn ask(&mut self, message: &str) -> io::Result<String> {
        if self.interactive {
            // Ctrl-C at this prompt comes back as ErrorKind::Interrupted.
            return Input::<String>::new()
                .with_prompt(message)
                .allow_empty(true)
                .interact_text();
        }

        let mut stdout = io::stdout();
        write!(stdout, "{}: ", message)?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Replays canned answers and records what was shown. Once the answers run
/// out every further `ask` fails with `UnexpectedEof`.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: usize,
    output: String,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: 0,
            output: String::new(),
        }
    }

    /// Number of questions asked so far.
    pub fn asked(&self) -> usize {
        self.asked
    }

    /// Everything passed to `say`, one message per line.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, _message: &str) -> io::Result<String> {
        self.asked += 1;
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn say(&mut self, message: &str) {
        self.output.push_str(message);
        self.output.push('\n');
    }
}

/// Success line with a green check mark.
pub fn ok(message: &str) -> String {
    format!("{} {}", "✓".green(), message)
}

/// Failure line with a red cross.
pub fn fail(message: &str) -> String {
    format!("{} {}", "✗".red(), message)
}

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Configure,
    Help,
    Download(String),
    Empty,
    Invalid,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => Command::Quit,
            "config" => Command::Configure,
            "help" => Command::Help,
            "" => Command::Empty,
            _ if line.starts_with("http") => Command::Download(line.to_string()),
            _ => Command::Invalid,
        }
    }
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The interactive session: current credentials, the HTTP client and the
/// prompt everything is read from.
pub struct Session<P: Prompt> {
    store: CredentialStore,
    credentials: Credentials,
    client: TrackClient,
    output_dir: PathBuf,
    prompt: P,
}

impl<P: Prompt> Session<P> {
    pub fn new(
        store: CredentialStore,
        credentials: Credentials,
        client: TrackClient,
        output_dir: PathBuf,
        prompt: P,
    ) -> Self {
        Session {
            store,
            credentials,
            client,
            output_dir,
            prompt,
        }
    }

    /// Load (or ask for) credentials and build the session from settings.
    /// `None` when the user interrupted or closed input during setup.
    pub fn start(
        settings: &Settings,
        interrupt: Interrupt,
        mut prompt: P,
    ) -> Result<Option<Self>> {
        let store = CredentialStore::new(&settings.config_file);
        let credentials = match store.load(&mut prompt) {
            Ok(credentials) => credentials,
            Err(e) => match e.downcast_ref::<io::Error>().and_then(farewell) {
                Some(msg) => {
                    prompt.say(msg);
                    return Ok(None);
                }
                None => return Err(e),
            },
        };
        let client = TrackClient::new(settings)?.with_interrupt(interrupt);
        Ok(Some(Session::new(
            store,
            credentials,
            client,
            settings.output_dir.clone(),
            prompt,
        )))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Run until the user quits, input closes or an interrupt arrives.
    pub fn run(&mut self) -> Result<()> {
        self.banner();
        loop {
            self.prompt.say("");
            let line = match self.prompt.ask("Enter media URL") {
                Ok(line) => line,
                Err(e) => match farewell(&e) {
                    Some(msg) => {
                        self.prompt.say(msg);
                        return Ok(());
                    }
                    None => return Err(e.into()),
                },
            };
            if self.handle(Command::parse(&line)) == Flow::Stop {
                return Ok(());
            }
        }
    }

    /// Execute one command.
    pub fn handle(&mut self, command: Command) -> Flow {
        debug!(?command, "dispatching");
        match command {
            Command::Quit => {
                self.prompt.say("Goodbye!");
                Flow::Stop
            }
            Command::Configure => match self.store.prompt(&mut self.prompt) {
                Ok(credentials) => {
                    self.credentials = credentials;
                    Flow::Continue
                }
                Err(e) => {
                    if let Some(msg) = e.downcast_ref::<io::Error>().and_then(farewell) {
                        self.prompt.say(msg);
                        return Flow::Stop;
                    }
                    self.prompt.say(&fail(&format!("Unexpected error: {:#}", e)));
                    Flow::Continue
                }
            },
            Command::Help => {
                self.commands();
                Flow::Continue
            }
            Command::Download(url) => {
                self.client.download_track(
                    &url,
                    &self.credentials,
                    &self.output_dir,
                    &mut self.prompt,
                );
                if self.client.interrupt().is_triggered() {
                    self.prompt.say(FAREWELL);
                    return Flow::Stop;
                }
                Flow::Continue
            }
            Command::Empty => Flow::Continue,
            Command::Invalid => {
                self.prompt
                    .say(&fail("Invalid input. Enter a URL or 'quit' to exit."));
                Flow::Continue
            }
        }
    }

    fn banner(&mut self) {
        self.prompt.say(&format!("\n{}", RULE));
        self.prompt.say("FitRadio Terminal Downloader");
        self.prompt.say(RULE);
        self.commands();
        self.prompt.say(RULE);
    }

    fn commands(&mut self) {
        self.prompt.say("Commands:");
        self.prompt.say("  [URL]  - Download track");
        self.prompt.say("  config - Reconfigure settings");
        self.prompt.say("  help   - Show this list");
        self.prompt.say("  quit   - Exit program");
    }
}

/// Message to end the session with when input stops, if the error means
/// the user is gone rather than something broke.
fn farewell(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::Interrupted => Some(FAREWELL),
        io::ErrorKind::UnexpectedEof => Some("Goodbye!"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn session(answers: &[&str]) -> (Session<ScriptedPrompt>, PathBuf) {
        let root = std::env::temp_dir().join(format!("fitradio-ui-test-{}", Uuid::new_v4()));
        let settings = Settings {
            config_file: root.join("fitradio_config.json"),
            output_dir: root.join("downloads"),
            show_progress: false,
        };
        let store = CredentialStore::new(&settings.config_file);
        let client = TrackClient::new(&settings).unwrap();
        let session = Session::new(
            store,
            Credentials::new("tok", "1"),
            client,
            settings.output_dir.clone(),
            ScriptedPrompt::new(answers.iter().copied()),
        );
        (session, root)
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("  EXIT "), Command::Quit);
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse("Config"), Command::Configure);
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(
            Command::parse(" https://x/y.mp3 "),
            Command::Download("https://x/y.mp3".into())
        );
        assert_eq!(Command::parse("hello"), Command::Invalid);
        assert_eq!(Command::parse("HTTPS://x/y.mp3"), Command::Invalid);
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut session, _) = session(&["quit", "config"]);
        session.run().unwrap();
        assert_eq!(session.prompt().asked(), 1);
        assert!(session.prompt().output().contains("Goodbye!"));
    }

    #[test]
    fn invalid_input_is_reported_without_side_effects() {
        let (mut session, root) = session(&["hello there", "", "q"]);
        session.run().unwrap();

        let output = session.prompt().output();
        assert_eq!(output.matches("Invalid input").count(), 1);
        assert!(!root.exists());
        assert_eq!(session.credentials(), &Credentials::new("tok", "1"));
    }

    #[test]
    fn config_reprompts_and_replaces_credentials() {
        let (mut session, root) = session(&["config", "new-token", "99", "exit"]);
        session.run().unwrap();

        assert_eq!(session.credentials(), &Credentials::new("new-token", "99"));
        let saved = CredentialStore::new(root.join("fitradio_config.json"))
            .read()
            .unwrap();
        assert_eq!(saved, Some(Credentials::new("new-token", "99")));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn closed_input_during_config_ends_session() {
        let (mut session, _) = session(&["config", "tok"]);
        session.run().unwrap();
        assert!(session.prompt().output().ends_with("Goodbye!\n"));
        assert_eq!(session.credentials(), &Credentials::new("tok", "1"));
    }

    #[test]
    fn closed_input_says_goodbye() {
        let (mut session, _) = session(&[]);
        session.run().unwrap();
        assert!(session.prompt().output().ends_with("Goodbye!\n"));
    }

    /// Every question is answered with Ctrl-C.
    struct Interrupting(ScriptedPrompt);

    impl Prompt for Interrupting {
        fn ask(&mut self, _message: &str) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::Interrupted, "ctrl-c"))
        }
        fn say(&mut self, message: &str) {
            self.0.say(message)
        }
    }

    #[test]
    fn interrupt_is_a_clean_exit() {
        let (inner, root) = session(&[]);
        let mut session = Session::new(
            CredentialStore::new(root.join("c.json")),
            inner.credentials().clone(),
            inner.client.clone(),
            root.join("downloads"),
            Interrupting(ScriptedPrompt::default()),
        );
        session.run().unwrap();
        assert!(session.prompt().0.output().contains("Interrupted. Goodbye!"));
    }

    #[test]
    fn broken_input_is_an_error() {
        struct Broken;
        impl Prompt for Broken {
            fn ask(&mut self, _message: &str) -> io::Result<String> {
                Err(io::Error::new(io::ErrorKind::Other, "tty gone"))
            }
            fn say(&mut self, _message: &str) {}
        }

        let (inner, root) = session(&[]);
        let mut session = Session::new(
            CredentialStore::new(root.join("c.json")),
            inner.credentials().clone(),
            inner.client.clone(),
            root.join("downloads"),
            Broken,
        );
        assert!(session.run().is_err());
    }

    #[test]
    fn interrupt_during_first_run_setup_is_a_clean_exit() {
        let root = std::env::temp_dir().join(format!("fitradio-ui-test-{}", Uuid::new_v4()));
        let settings = Settings {
            config_file: root.join("fitradio_config.json"),
            output_dir: root.join("downloads"),
            show_progress: false,
        };

        let mut prompt = Interrupting(ScriptedPrompt::default());
        let started = Session::start(&settings, Interrupt::default(), &mut prompt)
            .unwrap()
            .is_some();

        assert!(!started);
        assert!(prompt.0.output().ends_with("Interrupted. Goodbye!\n"));
        assert!(!settings.config_file.exists());
    }

    #[test]
    fn closed_input_during_first_run_setup_is_a_clean_exit() {
        let root = std::env::temp_dir().join(format!("fitradio-ui-test-{}", Uuid::new_v4()));
        let settings = Settings {
            config_file: root.join("fitradio_config.json"),
            output_dir: root.join("downloads"),
            show_progress: false,
        };

        let prompt = ScriptedPrompt::new(["tok"]);
        let session = Session::start(&settings, Interrupt::default(), prompt).unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn status_lines_keep_message_text() {
        assert!(ok("SUCCESS: a.mp3").ends_with("SUCCESS: a.mp3"));
        assert!(fail("FAILED: HTTP 500").ends_with("FAILED: HTTP 500"));
    }
}
