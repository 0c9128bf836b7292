use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;

use chrono::Utc;
use ticklist_core::cli::Command;
use ticklist_core::commands;
use ticklist_core::config::Config;
use ticklist_core::datastore::{FileStore, TaskPersistence};
use ticklist_core::render::Renderer;
use ticklist_core::store::TaskStore;
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> TaskStore<FileStore> {
    let kv = FileStore::open(dir).expect("open datastore");
    TaskStore::open(TaskPersistence::new(kv))
}

fn run(store: &mut TaskStore<FileStore>, command: Command, answer: &str) -> String {
    let mut input = Cursor::new(answer.as_bytes().to_vec());
    let mut out = Vec::new();
    commands::dispatch(
        store,
        &Config::defaults(),
        &Renderer::plain(chrono_tz::UTC),
        command,
        &mut input,
        &mut out,
        Utc::now(),
    )
    .expect("dispatch");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn collection_survives_reopen() {
    let temp = tempdir().expect("tempdir");

    let mut store = open(temp.path());
    store.add("A", Utc::now()).expect("add");
    store.add("B", Utc::now()).expect("add");
    let b = store.tasks()[0].id;
    store.toggle(b).expect("toggle");
    let expected = store.tasks().to_vec();
    drop(store);

    let reopened = open(temp.path());
    assert_eq!(reopened.tasks(), expected.as_slice());
    assert!(temp.path().join("todos.json").exists());
}

#[test]
fn empty_collection_round_trips() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store.add("only", Utc::now()).expect("add");
    let id = store.tasks()[0].id;
    store.delete(id).expect("delete");
    drop(store);

    let raw = fs::read_to_string(temp.path().join("todos.json")).expect("read");
    assert_eq!(raw, "[]");
    assert!(open(temp.path()).is_empty());
}

#[test]
fn corrupt_file_starts_empty_and_is_overwritten() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("todos.json"), "[{\"id\": 1}").expect("write");

    let mut store = open(temp.path());
    assert!(store.is_empty());

    store.add("fresh start", Utc::now()).expect("add");
    drop(store);
    assert_eq!(open(temp.path()).tasks()[0].text, "fresh start");
}

#[test]
fn buy_milk_scenario_through_commands() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());

    let out = run(&mut store, Command::Add { text: vec!["Buy".into(), "milk".into()] }, "");
    assert!(out.contains("Created task"));
    assert_eq!(store.tasks()[0].text, "Buy milk");
    assert!(!store.tasks()[0].completed);

    let out = run(&mut store, Command::Toggle { task: "1".into() }, "");
    assert!(out.contains("as done"));
    assert!(store.tasks()[0].completed);

    run(&mut store, Command::ClearCompleted, "");
    assert!(store.is_empty());

    let out = run(&mut store, Command::List, "");
    assert!(out.contains("All tasks completed!"));
    let view = Renderer::plain(chrono_tz::UTC).render(store.tasks(), None, &BTreeSet::new());
    assert!(view.is_all_clear());
}

#[test]
fn blank_add_is_rejected_with_message() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());

    let out = run(&mut store, Command::Add { text: vec!["   ".into()] }, "");
    assert!(out.contains("Oops! A task can't be empty."));
    assert!(store.is_empty());
    assert!(!temp.path().join("todos.json").exists());
}

#[test]
fn delete_prompt_honours_answer() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store.add("A", Utc::now()).expect("add");
    store.add("B", Utc::now()).expect("add");

    let out = run(&mut store, Command::Delete { task: "2".into(), yes: false }, "n\n");
    assert!(out.contains("[y/N]"));
    assert!(out.contains("Kept."));
    assert_eq!(store.len(), 2);

    run(&mut store, Command::Delete { task: "2".into(), yes: false }, "yes\n");
    let texts: Vec<_> = store.tasks().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["B"]);

    let out = run(&mut store, Command::Delete { task: "7".into(), yes: true }, "");
    assert!(out.contains("No task matches `7`."));
    assert_eq!(store.len(), 1);
}

#[test]
fn edit_refuses_blank_and_completed() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store.add("draft", Utc::now()).expect("add");

    let out = run(&mut store, Command::Edit { task: "1".into(), text: vec![" ".into()] }, "");
    assert!(out.contains("nothing changed"));
    assert_eq!(store.tasks()[0].text, "draft");

    run(&mut store, Command::Edit { task: "1".into(), text: vec![" final ".into()] }, "");
    assert_eq!(store.tasks()[0].text, "final");

    let id = store.tasks()[0].id;
    store.toggle(id).expect("toggle");
    let out = run(&mut store, Command::Edit { task: "1".into(), text: vec!["x".into()] }, "");
    assert!(out.contains("Completed tasks can't be edited."));
    assert_eq!(store.tasks()[0].text, "final");
}

#[test]
fn report_command_checks_length() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());

    let out = run(&mut store, Command::Report { text: vec!["bug".into()] }, "");
    assert!(out.contains("at least 10 characters"));

    let out = run(&mut store, Command::Report { text: vec!["clock".into(), "is".into(), "frozen".into()] }, "");
    assert!(out.contains("Thanks!"));
}
