use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use multipad_core::{Document, EditCommand, Editor, EditorKind, XmlElement};
use multipad_workspace::{LogObserver, SnapshotStore, StatisticsObserver, Workspace};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "multipad",
    about = "Interactive multi-document editor for text and XML files",
    author,
    version
)]
struct Cli {
    /// 工作區快照檔案位置。 / Location of the workspace snapshot file.
    #[arg(long, value_name = "PATH", default_value = "workspace_state.json")]
    state_file: PathBuf,

    /// 稽核軌跡檔案位置。 / Location of the audit trail file.
    #[arg(long, value_name = "PATH", default_value = "audit_trail.jsonl")]
    trail_file: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = SnapshotStore::new(&cli.state_file);
    let mut ws = Workspace::new();

    let log = Rc::new(RefCell::new(LogObserver::new(&cli.trail_file)));
    let stats = Rc::new(RefCell::new(StatisticsObserver::new()));
    ws.register_observer(log.clone());
    ws.register_observer(stats.clone());

    // 啟動時盡力還原上次的工作區；失敗只警告，不致命。 / Restore the previous
    // workspace best-effort on startup; failures warn, never abort.
    match store.load() {
        Ok(Some(snapshot)) => {
            let report = ws.restore_state(&snapshot);
            for issue in &report.issues {
                eprintln!("warning: {}: {}", issue.path.display(), issue.message);
            }
            println!("workspace restored ({} file(s) reopened)", report.opened);
        }
        Ok(None) => {}
        Err(err) => eprintln!("warning: could not restore workspace: {err}"),
    }

    println!("multipad ready; commands: load/save/close/undo/redo/exit ...");
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            // EOF 不算 exit：不持久化快照。 / EOF is not exit: no snapshot is persisted.
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" {
            store
                .save(&ws.capture_snapshot())
                .context("failed to persist workspace snapshot")?;
            println!("{}", stats.borrow().summary());
            break;
        }
        if let Err(err) = dispatch(&mut ws, &log, trimmed) {
            println!("error: {err:#}");
        }
    }
    Ok(())
}

fn dispatch(ws: &mut Workspace, log: &Rc<RefCell<LogObserver>>, line: &str) -> Result<()> {
    let (tokens, rest) = split_command(line, 1);
    let cmd = tokens.first().copied().unwrap_or_default();
    match cmd {
        "load" => {
            let path = require(rest, "load <path>")?;
            ws.open_or_create(path)?;
            println!("opened {path}");
        }
        "save" => {
            let editor = active_mut(ws)?;
            editor.save()?;
            println!("saved {}", editor.path().display());
        }
        "close" => {
            let path = match rest.is_empty() {
                true => active_mut(ws)?.path().to_path_buf(),
                false => PathBuf::from(rest),
            };
            ws.close(&path)?;
            println!("closed {}", path.display());
        }
        "init" => {
            let path = require(rest, "init <path>")?;
            ws.init(path)?;
            println!("initialised {path}");
        }
        "undo" => {
            active_mut(ws)?.undo()?;
            println!("undone");
        }
        "redo" => {
            active_mut(ws)?.redo()?;
            println!("redone");
        }
        "editor-list" => {
            for entry in ws.editor_list() {
                let marker = if entry.active { ">" } else { " " };
                let dirty = if entry.dirty { " *" } else { "" };
                println!("{marker} [{}] {}{dirty}", entry.kind, entry.path.display());
            }
        }
        "edit" => {
            let path = require(rest, "edit <path>")?;
            ws.set_active(Path::new(path))?;
            println!("active: {path}");
        }
        "dir-tree" => {
            let root = if rest.is_empty() { "." } else { rest };
            print_dir_tree(root);
        }
        "append" => {
            let editor = active_mut(ws)?;
            let line_count = match editor.document() {
                Document::Text(doc) => doc.line_count(),
                Document::Xml(_) => bail!("append targets a text editor"),
            };
            editor.apply_edit(EditCommand::InsertLine {
                line: line_count + 1,
                text: rest.to_string(),
            })?;
        }
        "insert" => {
            let (args, text) = split_command(rest, 1);
            let line_no = parse_line(args.first().copied(), "insert <line> <text>")?;
            active_mut(ws)?.apply_edit(EditCommand::InsertLine {
                line: line_no,
                text: text.to_string(),
            })?;
        }
        "show" => {
            let editor = active_editor(ws)?;
            match editor.document() {
                Document::Text(doc) => {
                    for (index, text) in doc.lines().iter().enumerate() {
                        println!("{:>4}  {text}", index + 1);
                    }
                }
                Document::Xml(_) => println!("{}", editor.contents()),
            }
        }
        // delete 依作用中編輯器的種類嚴格分派。 / delete dispatches strictly on the active editor's kind.
        "delete" => {
            let target = require(rest, "delete <line|id>")?;
            let editor = active_mut(ws)?;
            let command = match editor.kind() {
                EditorKind::Text => EditCommand::DeleteLine {
                    line: parse_line(Some(target), "delete <line>")?,
                    removed: None,
                },
                EditorKind::Xml => EditCommand::XmlDelete {
                    id: target.to_string(),
                    removed: None,
                },
            };
            editor.apply_edit(command)?;
        }
        "replace" => {
            let (args, text) = split_command(rest, 2);
            let start = parse_line(args.first().copied(), "replace <start> <count> <text>")?;
            let count = parse_line(args.get(1).copied(), "replace <start> <count> <text>")?;
            active_mut(ws)?.apply_edit(EditCommand::ReplaceLines {
                start,
                count,
                new_lines: vec![text.to_string()],
                old_lines: None,
            })?;
        }
        "log-on" => {
            log.borrow_mut().set_enabled(true);
            println!("audit log enabled");
        }
        "log-off" => {
            log.borrow_mut().set_enabled(false);
            println!("audit log disabled");
        }
        "log-show" => {
            for record in log.borrow().show()? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        "insert-before" => {
            let (args, text) = split_command(rest, 3);
            let [target, tag, id] = xml_triple(&args, "insert-before <target-id> <tag> <id> [text]")?;
            active_mut(ws)?.apply_edit(EditCommand::XmlInsertBefore {
                target_id: target.to_string(),
                element: new_element(tag, id, text),
            })?;
        }
        "append-child" => {
            let (args, text) = split_command(rest, 3);
            let [parent, tag, id] = xml_triple(&args, "append-child <parent-id> <tag> <id> [text]")?;
            active_mut(ws)?.apply_edit(EditCommand::XmlAppendChild {
                parent_id: parent.to_string(),
                element: new_element(tag, id, text),
            })?;
        }
        "edit-id" => {
            let (args, _) = split_command(rest, 2);
            let [old_id, new_id] = match args.as_slice() {
                [old_id, new_id] => [*old_id, *new_id],
                _ => bail!("usage: edit-id <old-id> <new-id>"),
            };
            active_mut(ws)?.apply_edit(EditCommand::XmlEditId {
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            })?;
        }
        "edit-text" => {
            let (args, text) = split_command(rest, 1);
            let id = args
                .first()
                .ok_or_else(|| anyhow!("usage: edit-text <id> [text]"))?;
            let text = if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            };
            active_mut(ws)?.apply_edit(EditCommand::XmlEditText {
                id: id.to_string(),
                text,
                prior: None,
            })?;
        }
        "xml-tree" => {
            let editor = active_editor(ws)?;
            let document = match editor.document() {
                Document::Xml(document) => document,
                Document::Text(_) => bail!("active editor is not an XML editor"),
            };
            for item in document.traverse() {
                let indent = "  ".repeat(item.depth);
                match item.text {
                    Some(text) => println!("{indent}{} (id={}) {text}", item.tag, item.id),
                    None => println!("{indent}{} (id={})", item.tag, item.id),
                }
            }
        }
        "spell-check" => {
            let findings = spell_check(&active_editor(ws)?.document().extract_text());
            if findings.is_empty() {
                println!("no spelling issues found");
            } else {
                for finding in findings {
                    println!("{finding}");
                }
            }
        }
        other => println!("unknown command {other:?}; supported: load/save/close/undo/exit ..."),
    }
    Ok(())
}

/// 切出前 n 個以空白分隔的標記，並回傳未裁切的剩餘文字。 / Splits off the
/// first `n` whitespace-delimited tokens and returns the untrimmed remainder.
fn split_command(line: &str, n: usize) -> (Vec<&str>, &str) {
    let mut rest = line.trim_start();
    let mut tokens = Vec::with_capacity(n);
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        if !token.is_empty() {
            tokens.push(token);
        }
        rest = tail.trim_start();
    }
    (tokens, rest)
}

fn require<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest)
}

fn parse_line(token: Option<&str>, usage: &str) -> Result<usize> {
    token
        .ok_or_else(|| anyhow!("usage: {usage}"))?
        .parse::<usize>()
        .map_err(|_| anyhow!("usage: {usage}"))
}

fn xml_triple<'a>(args: &[&'a str], usage: &str) -> Result<[&'a str; 3]> {
    match args {
        [first, second, third] => Ok([*first, *second, *third]),
        _ => bail!("usage: {usage}"),
    }
}

fn new_element(tag: &str, id: &str, text: &str) -> XmlElement {
    let element = XmlElement::new(tag, id);
    if text.is_empty() {
        element
    } else {
        element.with_text(text)
    }
}

fn active_editor<'a>(ws: &'a Workspace) -> Result<&'a Editor> {
    ws.active_editor().ok_or_else(|| anyhow!("no active editor"))
}

fn active_mut<'a>(ws: &'a mut Workspace) -> Result<&'a mut Editor> {
    ws.active_editor_mut()
        .ok_or_else(|| anyhow!("no active editor"))
}

fn print_dir_tree(root: &str) {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("warning: {err}");
                continue;
            }
        };
        let name = if entry.depth() == 0 {
            entry.path().display().to_string()
        } else {
            entry.file_name().to_string_lossy().into_owned()
        };
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        println!("{}{name}{suffix}", "  ".repeat(entry.depth()));
    }
}

/// 純文字啟發式檢查：相鄰重複字與字母數字混雜的字串。 / Heuristic pure-text
/// pass: adjacent duplicate words and tokens mixing letters with digits.
fn spell_check(content: &str) -> Vec<String> {
    let mut findings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let mut previous: Option<String> = None;
        for word in line.split_whitespace() {
            let token: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if token.is_empty() {
                previous = None;
                continue;
            }
            if previous.as_deref() == Some(token.as_str()) {
                findings.push(format!("line {}: repeated word {token:?}", index + 1));
            }
            if token.chars().any(|c| c.is_alphabetic()) && token.chars().any(|c| c.is_ascii_digit())
            {
                findings.push(format!(
                    "line {}: suspicious token {word:?} mixes letters and digits",
                    index + 1
                ));
            }
            previous = Some(token);
        }
    }
    findings
}
