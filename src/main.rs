// Entrypoint for the downloader.
// - Keeps `main` small: read settings, load credentials and hand over to
//   the command loop.
// - Settings come from `FITRADIO_*` environment variables, see
//   `config::Settings::from_env`.

use fitradio_dl::{logging, Interrupt, Session, Settings, TerminalPrompt};

fn main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let interrupt = Interrupt::install()?;

    let settings = Settings::from_env();
    tracing::debug!(?settings, "starting");

    // Prompts for credentials on first run, then blocks until the user exits.
    if let Some(mut session) = Session::start(&settings, interrupt, TerminalPrompt::new())? {
        session.run()?;
    }
    Ok(())
}
