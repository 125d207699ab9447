use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn multipad(dir: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("multipad")?;
    cmd.current_dir(dir)
        .arg("--state-file")
        .arg(dir.join("workspace_state.json"))
        .arg("--trail-file")
        .arg(dir.join("audit_trail.jsonl"));
    Ok(cmd)
}

#[test]
fn text_session_edits_and_saves() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("notes.txt");
    fs::write(&file, "first\n")?;

    multipad(dir.path())?
        .write_stdin(format!(
            "load {}\nappend second line\ninsert 1 zeroth\nsave\nexit\n",
            file.display()
        ))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file)?, "zeroth\nfirst\nsecond line\n");
    assert!(dir.path().join("workspace_state.json").exists());
    Ok(())
}

#[test]
fn workspace_state_survives_across_runs() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("kept.txt");
    fs::write(&file, "hello\n")?;

    multipad(dir.path())?
        .write_stdin(format!("load {}\nexit\n", file.display()))
        .assert()
        .success();

    multipad(dir.path())?
        .write_stdin("editor-list\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace restored"))
        .stdout(predicate::str::contains("kept.txt"));
    Ok(())
}

#[test]
fn xml_editing_round_trip() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("doc.xml");

    multipad(dir.path())?
        .write_stdin(format!(
            "load {}\nappend-child root note n1 hello world\nxml-tree\nsave\nexit\n",
            file.display()
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains("note (id=n1) hello world"));

    assert_eq!(
        fs::read_to_string(&file)?,
        r#"<root id="root"><note id="n1">hello world</note></root>"#
    );
    Ok(())
}

#[test]
fn undo_reverts_the_last_edit() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("notes.txt");
    fs::write(&file, "keep\n")?;

    multipad(dir.path())?
        .write_stdin(format!(
            "load {}\nappend mistake\nundo\nsave\nexit\n",
            file.display()
        ))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file)?, "keep\n");
    Ok(())
}

#[test]
fn delete_dispatches_on_editor_kind() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let text = dir.path().join("a.txt");
    let xml = dir.path().join("b.xml");
    fs::write(&text, "one\ntwo\n")?;

    multipad(dir.path())?
        .write_stdin(format!(
            "load {text}\ndelete 1\nsave\nload {xml}\nappend-child root item x1\ndelete x1\nsave\nexit\n",
            text = text.display(),
            xml = xml.display()
        ))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&text)?, "two\n");
    assert_eq!(fs::read_to_string(&xml)?, r#"<root id="root"/>"#);
    Ok(())
}

#[test]
fn undo_with_empty_history_reports_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("a.txt");
    fs::write(&file, "x\n")?;

    multipad(dir.path())?
        .write_stdin(format!("load {}\nundo\nexit\n", file.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("error:"));
    Ok(())
}

#[test]
fn log_show_replays_the_audit_trail() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("a.txt");
    fs::write(&file, "x\n")?;

    multipad(dir.path())?
        .write_stdin(format!(
            "load {}\nappend y\nlog-show\nexit\n",
            file.display()
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"loaded\""))
        .stdout(predicate::str::contains("\"edited\""));
    Ok(())
}

#[test]
fn spell_check_flags_repeated_words() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("a.txt");
    fs::write(&file, "the the quick fox9\n")?;

    multipad(dir.path())?
        .write_stdin(format!("load {}\nspell-check\nexit\n", file.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("repeated word"))
        .stdout(predicate::str::contains("fox9"));
    Ok(())
}
