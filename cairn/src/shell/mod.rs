//! # Shell
//!
//! A line-oriented editor over one project, reading commands from a terminal or a script. Each line is one
//! verb and its arguments. Edits made between `begin` and `commit` form a single transaction, edits made
//! outside of one are committed straight away. See `help` for the verbs, and [`literal`] for how values are
//! written.

pub mod literal;

use std::io::{BufRead, Write};
use std::sync::Arc;

use cairn_core::events::HistoryEvent;
use cairn_core::{
    ApplyError, AssetKind, AssetPath, HistoryError, PathError, Project, TransactionBuilder, Value,
    Watch,
};
use strum::{EnumMessage, IntoEnumIterator};

use crate::global::Preferences;

#[derive(
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumMessage,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Verb {
    #[strum(
        message = "begin <description>",
        detailed_message = "Collect the following edits into one transaction."
    )]
    Begin,
    #[strum(message = "create <path> <kind>")]
    Create,
    #[strum(
        message = "destroy <path>",
        detailed_message = "Remove only the asset at <path>. Anything below it stays."
    )]
    Destroy,
    #[strum(
        message = "destroy-tree <path>",
        detailed_message = "Remove the asset at <path> and everything below it."
    )]
    DestroyTree,
    #[strum(
        message = "rename <from> <to>",
        detailed_message = "Move an asset and everything below it."
    )]
    Rename,
    #[strum(
        message = "set <path> <field> <value>",
        detailed_message = "Values are true, false, 12, 0.5, \"text\", 0xbeef, @a/path, or [lists, of, those]."
    )]
    Set,
    #[strum(message = "clear <path> <field>")]
    Clear,
    #[strum(
        message = "commit",
        detailed_message = "Apply the transaction started by `begin`. It is discarded if it fails."
    )]
    Commit,
    #[strum(message = "abort", detailed_message = "Discard the transaction started by `begin`.")]
    Abort,
    #[strum(message = "undo")]
    Undo,
    #[strum(message = "redo")]
    Redo,
    #[strum(message = "get <path>")]
    Get,
    #[strum(
        message = "ls [prefix]",
        detailed_message = "List every asset, or those at and below <prefix>."
    )]
    Ls,
    #[strum(message = "history", detailed_message = "Applied steps are marked with *.")]
    History,
    #[strum(message = "kinds", detailed_message = "List the kinds and fields that are accepted.")]
    Kinds,
    #[strum(
        message = "prefs [save]",
        detailed_message = "Show the preferences in use, or write them to the preferences directory."
    )]
    Prefs,
    #[strum(message = "help [verb]")]
    Help,
    #[strum(message = "quit")]
    Quit,
}
impl Verb {
    #[must_use]
    pub fn usage(self) -> &'static str {
        self.get_message().unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ShellError {
    #[error("unknown verb {0:?}, try `help`")]
    UnknownVerb(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Literal(#[from] literal::LiteralError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("no transaction in progress, start one with `begin`")]
    NotInTransaction,
    #[error("a transaction is already in progress, `commit` or `abort` it first")]
    AlreadyInTransaction,
    #[error("preferences: {0:#}")]
    Prefs(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type Echoed = Arc<parking_lot::Mutex<Vec<String>>>;

pub struct Session<W: Write> {
    project: Project,
    prefs: Preferences,
    out: W,
    /// Set between `begin` and `commit`.
    pending: Option<TransactionBuilder>,
    /// Event lines waiting to be written to `out`.
    echoed: Echoed,
    _watches: Vec<Watch>,
}
impl<W: Write> Session<W> {
    pub fn new(project: Project, prefs: Preferences, out: W) -> Self {
        let echoed = Echoed::default();
        let watches = if prefs.echo_events {
            echo_events(&project, &echoed)
        } else {
            Vec::new()
        };
        Self {
            project,
            prefs,
            out,
            pending: None,
            echoed,
            _watches: watches,
        }
    }
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }
    /// Execute every line of `input`. Errors in a line are reported to the output and do not stop the run,
    /// only failing to read or write does.
    pub fn run(&mut self, mut input: impl BufRead, prompt: bool) -> std::io::Result<Flow> {
        let mut line = String::new();
        loop {
            if prompt {
                let marker = if self.pending.is_some() { "*" } else { "" };
                write!(self.out, "cairn{marker}> ")?;
                self.out.flush()?;
            }
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(Flow::Continue);
            }
            let flow = match self.execute(&line) {
                Ok(flow) => flow,
                Err(ShellError::Io(e)) => return Err(e),
                Err(e) => {
                    self.echo()?;
                    writeln!(self.out, "error: {e}")?;
                    Flow::Continue
                }
            };
            self.echo()?;
            if flow == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
    }
    /// Execute a single line. Blank lines and lines starting with `#` are ignored.
    pub fn execute(&mut self, line: &str) -> Result<Flow, ShellError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Flow::Continue);
        }
        let (word, rest) = split_word(line);
        let verb: Verb = word
            .parse()
            .map_err(|_| ShellError::UnknownVerb(word.to_owned()))?;
        let usage = || ShellError::Usage(verb.usage());
        log::trace!("shell: {line}");

        match verb {
            Verb::Begin => {
                if self.pending.is_some() {
                    return Err(ShellError::AlreadyInTransaction);
                }
                if rest.is_empty() {
                    return Err(usage());
                }
                self.pending = Some(self.project.build_transaction(rest));
            }
            Verb::Create => {
                let [path, kind] = words(rest).ok_or_else(usage)?;
                let path = AssetPath::parse(path)?;
                let kind = AssetKind::new(kind);
                return self.edit(|tx| {
                    tx.create(path, kind);
                });
            }
            Verb::Destroy => {
                let [path] = words(rest).ok_or_else(usage)?;
                let path = AssetPath::parse(path)?;
                return self.edit(|tx| {
                    tx.destroy(path);
                });
            }
            Verb::DestroyTree => {
                let [path] = words(rest).ok_or_else(usage)?;
                let path = AssetPath::parse(path)?;
                return self.edit(|tx| {
                    tx.destroy_tree(path);
                });
            }
            Verb::Rename => {
                let [from, to] = words(rest).ok_or_else(usage)?;
                let (from, to) = (AssetPath::parse(from)?, AssetPath::parse(to)?);
                return self.edit(|tx| {
                    tx.rename(from, to);
                });
            }
            Verb::Set => {
                let (path, rest) = split_word(rest);
                let (field, value) = split_word(rest);
                if field.is_empty() {
                    return Err(usage());
                }
                let path = AssetPath::parse(path)?;
                let value = literal::parse(value)?;
                let field = field.to_owned();
                return self.edit(|tx| {
                    tx.set_field(path, field, value);
                });
            }
            Verb::Clear => {
                let [path, field] = words(rest).ok_or_else(usage)?;
                let path = AssetPath::parse(path)?;
                let field = field.to_owned();
                return self.edit(|tx| {
                    tx.clear_field(path, field);
                });
            }
            Verb::Commit => {
                let tx = self.pending.take().ok_or(ShellError::NotInTransaction)?;
                self.commit(&tx)?;
            }
            Verb::Abort => {
                let tx = self.pending.take().ok_or(ShellError::NotInTransaction)?;
                writeln!(
                    self.out,
                    "discarded {:?} ({} ops)",
                    tx.description(),
                    tx.len()
                )?;
            }
            Verb::Undo => {
                let description = self.project.history().undo_description().map(str::to_owned);
                let stepped = self.project.undo();
                self.echo()?;
                match (stepped?, description) {
                    (true, Some(description)) => writeln!(self.out, "undid {description:?}")?,
                    _ => writeln!(self.out, "nothing to undo")?,
                }
            }
            Verb::Redo => {
                let description = self.project.history().redo_description().map(str::to_owned);
                let stepped = self.project.redo();
                self.echo()?;
                match (stepped?, description) {
                    (true, Some(description)) => writeln!(self.out, "redid {description:?}")?,
                    _ => writeln!(self.out, "nothing to redo")?,
                }
            }
            Verb::Get => {
                let [path] = words(rest).ok_or_else(usage)?;
                let path = AssetPath::parse(path)?;
                match self.project.resolve_any(&path) {
                    None => writeln!(self.out, "nothing at {path}")?,
                    Some(view) => {
                        writeln!(self.out, "{path} ({})", view.kind())?;
                        for (name, value) in view.asset().fields() {
                            writeln!(self.out, "  {name} = {value}")?;
                        }
                    }
                }
            }
            Verb::Ls => {
                let listed: Vec<_> = if rest.is_empty() {
                    self.project.snapshot().iter().collect()
                } else {
                    self.project.enumerate(rest)?.iter().collect()
                };
                if listed.is_empty() {
                    writeln!(self.out, "(empty)")?;
                }
                for view in listed {
                    writeln!(self.out, "{} ({})", view.path(), view.kind())?;
                }
            }
            Verb::History => {
                let summary = self.project.history();
                if summary.is_empty() {
                    writeln!(self.out, "(no history)")?;
                }
                for description in summary.applied() {
                    writeln!(self.out, "* {description}")?;
                }
                for description in summary.redoable() {
                    writeln!(self.out, "  {description}")?;
                }
            }
            Verb::Kinds => match self.project.registry() {
                None => writeln!(self.out, "any kind and field is accepted (strict_kinds is off)")?,
                Some(registry) => {
                    for schema in registry.schemas() {
                        writeln!(self.out, "{}: {}", schema.kind(), schema.description)?;
                        for field in schema.fields() {
                            writeln!(self.out, "  {}: {}", field.name, field.ty)?;
                        }
                    }
                }
            },
            Verb::Prefs => match rest {
                "" => {
                    let text = self.prefs.to_toml().map_err(anyhow::Error::from)?;
                    write!(self.out, "{text}")?;
                }
                "save" => {
                    let path = self.prefs.save()?;
                    writeln!(self.out, "saved to {}", path.display())?;
                }
                _ => return Err(usage()),
            },
            Verb::Help => {
                if rest.is_empty() {
                    for verb in Verb::iter() {
                        writeln!(self.out, "{}", verb.usage())?;
                    }
                } else {
                    let verb: Verb = rest
                        .parse()
                        .map_err(|_| ShellError::UnknownVerb(rest.to_owned()))?;
                    writeln!(self.out, "{}", verb.usage())?;
                    if let Some(detail) = verb.get_detailed_message() {
                        writeln!(self.out, "  {detail}")?;
                    }
                }
            }
            Verb::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
    /// Record an edit into the open transaction, or commit it on its own if there is none.
    fn edit(&mut self, record: impl FnOnce(&mut TransactionBuilder)) -> Result<Flow, ShellError> {
        if let Some(tx) = &mut self.pending {
            record(tx);
            return Ok(Flow::Continue);
        }
        let mut tx = self.project.build_transaction(String::new());
        record(&mut tx);
        let description = tx
            .ops()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        tx.describe(description);
        self.commit(&tx)?;
        Ok(Flow::Continue)
    }
    fn commit(&mut self, tx: &TransactionBuilder) -> Result<(), ShellError> {
        let result = self.project.commit(tx);
        self.echo()?;
        result?;
        writeln!(
            self.out,
            "committed {:?} at revision {}",
            tx.description(),
            self.project.revision()
        )?;
        Ok(())
    }
    /// Write out any event lines collected since the last call.
    fn echo(&mut self) -> std::io::Result<()> {
        let lines = std::mem::take(&mut *self.echoed.lock());
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
    /// End the session, handing back the output.
    pub fn finish(mut self) -> W {
        if let Some(tx) = self.pending.take() {
            log::warn!(
                "discarding uncommitted transaction {:?} ({} ops)",
                tx.description(),
                tx.len()
            );
        }
        self.out
    }
}

fn echo_events(project: &Project, echoed: &Echoed) -> Vec<Watch> {
    let disappear = {
        let echoed = echoed.clone();
        project.subscribe_disappear(move |event| {
            echoed
                .lock()
                .push(format!("- {} ({})", event.path, event.kind()));
        })
    };
    let appear = {
        let echoed = echoed.clone();
        project.subscribe_appear(move |event| {
            echoed
                .lock()
                .push(format!("+ {} ({})", event.path, event.kind()));
        })
    };
    let fields = {
        let echoed = echoed.clone();
        project.subscribe_field_changes(move |event| {
            echoed.lock().push(format!(
                "~ {}.{}: {} -> {}",
                event.path,
                event.field,
                show(event.old.as_ref()),
                show(event.new.as_ref())
            ));
        })
    };
    let history = {
        let echoed = echoed.clone();
        project.subscribe_history(move |event| {
            let what = match event {
                HistoryEvent::Committed { .. } => "committed",
                HistoryEvent::Undone { .. } => "undone",
                HistoryEvent::Redone { .. } => "redone",
            };
            echoed.lock().push(format!(
                "! {what} {:?} (revision {})",
                event.description(),
                event.revision()
            ));
        })
    };
    vec![disappear, appear, fields, history]
}

fn show(value: Option<&Value>) -> String {
    value.map_or_else(|| "(unset)".to_owned(), ToString::to_string)
}

/// Split off the first whitespace-delimited word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

/// Exactly `N` whitespace-delimited words.
fn words<const N: usize>(text: &str) -> Option<[&str; N]> {
    let words: smallvec::SmallVec<[&str; 4]> = text.split_whitespace().collect();
    <[&str; N]>::try_from(words.as_slice()).ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use cairn_core::ProjectOptions;

    fn session(prefs: Preferences) -> Session<Vec<u8>> {
        let project = Project::with_options(ProjectOptions {
            registry: Some(Arc::new(crate::kinds::registry())),
            history_limit: prefs.history_limit(),
        });
        Session::new(project, prefs, Vec::new())
    }
    fn script(prefs: Preferences, text: &str) -> (Flow, String) {
        let mut session = session(prefs);
        let flow = session.run(text.as_bytes(), false).unwrap();
        let out = String::from_utf8(session.finish()).unwrap();
        (flow, out)
    }
    #[test]
    fn verbs() {
        assert_eq!("destroy-tree".parse::<Verb>(), Ok(Verb::DestroyTree));
        assert_eq!(Verb::Ls.as_ref(), "ls");
        for verb in Verb::iter() {
            assert!(verb.usage().starts_with(verb.as_ref()), "{verb:?}");
        }
    }
    #[test]
    fn parts() {
        assert_eq!(split_word("  set a/b  x 1 "), ("set", "a/b  x 1 "));
        assert_eq!(split_word("quit"), ("quit", ""));
        assert_eq!(words::<2>("a  b"), Some(["a", "b"]));
        assert_eq!(words::<2>("a b c"), None);
        assert_eq!(words::<1>(""), None);
    }
    #[test]
    fn edits_commit_immediately() {
        let (flow, out) = script(
            Preferences::default(),
            "# comment\n\
             create testbox/anim anim\n\
             \n\
             set testbox/anim fps 24.0\n\
             get testbox/anim\n",
        );
        assert_eq!(flow, Flow::Continue);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            [
                r#"committed "create testbox/anim (anim)" at revision 1"#,
                r#"committed "set testbox/anim.fps to 24.0" at revision 2"#,
                "testbox/anim (anim)",
                "  fps = 24.0",
            ]
        );
    }
    #[test]
    fn transaction_with_events() {
        let mut prefs = Preferences::default();
        prefs.echo_events = true;
        let (_, out) = script(
            prefs,
            "begin make a mesh\n\
             create m mesh\n\
             set m name \"cube\"\n\
             commit\n\
             rename m n\n\
             clear n name\n",
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            [
                // New assets only appear, their fields are part of them.
                "+ m (mesh)",
                r#"! committed "make a mesh" (revision 1)"#,
                r#"committed "make a mesh" at revision 1"#,
                "- m (mesh)",
                "+ n (mesh)",
                r#"! committed "rename m to n" (revision 2)"#,
                r#"committed "rename m to n" at revision 2"#,
                r#"~ n.name: "cube" -> (unset)"#,
                r#"! committed "clear n.name" (revision 3)"#,
                r#"committed "clear n.name" at revision 3"#,
            ]
        );
    }
    #[test]
    fn errors_keep_going() {
        let (flow, out) = script(
            Preferences::default(),
            "frobnicate\n\
             destroy nope\n\
             create a//b raw\n\
             create thing teapot\n\
             set x\n\
             commit\n\
             quit\n\
             create never raw\n",
        );
        assert_eq!(flow, Flow::Quit);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 6, "{out}");
        assert!(lines.iter().all(|line| line.starts_with("error: ")), "{out}");
        assert!(lines[0].contains("frobnicate"));
        assert!(lines[1].contains("no asset at nope"));
        assert!(lines[4].contains(Verb::Set.usage()));
        assert!(!out.contains("never"));
    }
    #[test]
    fn failed_transaction_is_discarded() {
        let mut session = session(Preferences::default());
        session.execute("begin two things").unwrap();
        assert!(matches!(
            session.execute("begin another"),
            Err(ShellError::AlreadyInTransaction)
        ));
        session.execute("create a raw").unwrap();
        session.execute("create a raw").unwrap();
        assert!(matches!(
            session.execute("commit"),
            Err(ShellError::Apply(ApplyError::PathConflict(_)))
        ));
        assert!(matches!(
            session.execute("abort"),
            Err(ShellError::NotInTransaction)
        ));
        assert_eq!(session.project().revision(), 0);
        assert!(session.project().snapshot().is_empty());
    }
    #[test]
    fn undo_redo_and_history() {
        let (_, out) = script(
            Preferences::default(),
            "create a raw\n\
             create b raw\n\
             undo\n\
             history\n\
             redo\n\
             redo\n\
             ls\n",
        );
        let lines: Vec<_> = out.lines().skip(2).collect();
        assert_eq!(
            lines,
            [
                r#"undid "create b (raw)""#,
                "* create a (raw)",
                "  create b (raw)",
                r#"redid "create b (raw)""#,
                "nothing to redo",
                "a (raw)",
                "b (raw)",
            ]
        );
    }
    #[test]
    fn listing_and_kinds() {
        let mut session = session(Preferences::default());
        session
            .run(
                "create anim anim\ncreate anim/0 frame\ncreate animal raw\n".as_bytes(),
                false,
            )
            .unwrap();
        session.out.clear();
        session.execute("ls anim").unwrap();
        session.execute("kinds").unwrap();
        let out = String::from_utf8(session.finish()).unwrap();
        assert!(out.starts_with("anim (anim)\nanim/0 (frame)\nanim: "), "{out}");
        assert!(out.contains("  fps: Float\n"), "{out}");

        let mut permissive = Session::new(Project::new(), Preferences::default(), Vec::new());
        permissive.execute("kinds").unwrap();
        permissive.execute("create a teapot").unwrap();
        let out = String::from_utf8(permissive.finish()).unwrap();
        assert!(out.contains("strict_kinds is off"));
        assert!(out.contains("at revision 1"));
    }
    #[test]
    fn help() {
        let mut session = session(Preferences::default());
        session.execute("help destroy").unwrap();
        session.execute("help").unwrap();
        let out = String::from_utf8(session.finish()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "destroy <path>");
        assert!(lines[1].starts_with("  Remove only"));
        assert_eq!(lines.len(), 2 + Verb::iter().count());
    }
}
