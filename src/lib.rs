// Library root
// -----------
// The binary (`main.rs`) wires these modules into the interactive
// downloader.
//
// Module responsibilities:
// - `config`: the stored bearer token / user id pair and the settings
//   read from the environment.
// - `api`: the authenticated track download over HTTP.
// - `ui`: the prompt abstraction and the command loop.
// - `error`: download failures the loop reports.
// - `interrupt`: Ctrl-C handling shared by the loop and the download.
// - `logging`: tracing subscriber setup.
pub mod api;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod ui;

pub use api::{file_name_from_url, Download, TrackClient};
pub use config::{CredentialStore, Credentials, Settings};
pub use error::FetchError;
pub use interrupt::Interrupt;
pub use ui::{Command, Prompt, ScriptedPrompt, Session, TerminalPrompt};
