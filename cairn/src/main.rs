#![warn(clippy::pedantic)]

pub mod global;
pub mod kinds;
pub mod shell;

use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use cairn_core::{Project, ProjectOptions};

fn main() -> AnyResult<()> {
    let preferences = global::Preferences::get();
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    let level = log::LevelFilter::from(preferences.log_level);
    if has_term {
        env_logger::builder().filter_level(level).init();
    } else {
        let _ = simple_logging::log_to_file("log.out", level);
    }
    if preferences.did_fail_to_load() {
        log::warn!("Failed to load preferences, using defaults.");
    }

    let registry = preferences
        .strict_kinds
        .then(|| Arc::new(kinds::registry()));
    let project = Project::with_options(ProjectOptions {
        registry,
        history_limit: preferences.history_limit(),
    });
    log::debug!("opened {project:?}");

    let mut session = shell::Session::new(project, preferences.clone(), std::io::stdout().lock());
    // Args are a list of scripts to run in order. With none, read stdin.
    let paths: Vec<std::path::PathBuf> = std::env::args_os().skip(1).map(Into::into).collect();
    if paths.is_empty() {
        session.run(std::io::stdin().lock(), has_term)?;
    } else {
        for path in &paths {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            let flow = session
                .run(std::io::BufReader::new(file), false)
                .with_context(|| format!("while running {}", path.display()))?;
            if flow == shell::Flow::Quit {
                break;
            }
        }
    }
    drop(session.finish());
    Ok(())
}
