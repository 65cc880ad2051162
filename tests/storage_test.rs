//! On-disk behavior of the prompt, session and credential stores.

mod common;

use lmc::core::models::SessionResponse;
use lmc::storage::{
    AppPaths, CredentialStore, DEFAULT_CATEGORIES, FileCredentialStore, PromptStore, SessionStore,
    UserPromptStore,
};
use lmc::TestDir;

use common::logger::TestLogger;

fn response(model: &str, content: &str) -> SessionResponse {
    SessionResponse {
        model: model.to_string(),
        content: content.to_string(),
        cost: None,
    }
}

#[test]
fn sessions_survive_reload_newest_first() {
    let log = TestLogger::new("sessions_survive_reload_newest_first");
    let dir = TestDir::new();
    let paths = AppPaths::with_root(dir.path());

    log.phase("write");
    let (first, second) = {
        let mut store = SessionStore::load(paths.sessions_file()).expect("load");
        let first = store
            .create("sys", "Explain borrowing", vec![response("openai/gpt-4o", "Borrowing is...")])
            .expect("create");
        let second = store
            .create(
                "sys",
                "Explain lifetimes",
                vec![
                    response("openai/gpt-4o", "Lifetimes are..."),
                    response("llama3", "A lifetime..."),
                ],
            )
            .expect("create");
        (first, second)
    };
    assert!(second.id > first.id);

    log.phase("reload");
    let store = SessionStore::load(paths.sessions_file()).expect("reload");
    assert_eq!(store.len(), 2);
    let listed: Vec<u64> = store.list().iter().map(|s| s.id).collect();
    assert_eq!(listed, vec![second.id, first.id]);
    assert_eq!(store.get(second.id).unwrap().models, vec!["openai/gpt-4o", "llama3"]);

    let hits = store.search("LLAMA");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, second.id);
    log.finish_ok();
}

#[test]
fn deleting_sessions_persists() {
    let dir = TestDir::new();
    let path = dir.file_path("sessions.json");
    let id = {
        let mut store = SessionStore::load(&path).expect("load");
        let session = store.create("", "hi", vec![response("m", "hello")]).expect("create");
        assert!(!store.delete(session.id + 1000).expect("delete"));
        assert!(store.delete(session.id).expect("delete"));
        session.id
    };

    let store = SessionStore::load(&path).expect("reload");
    assert!(store.is_empty());
    assert!(store.get(id).is_none());
}

#[test]
fn corrupt_session_file_is_an_error() {
    let dir = TestDir::new();
    dir.create_file("sessions.json", "{not json");
    assert!(SessionStore::load(dir.file_path("sessions.json")).is_err());
}

#[test]
fn blank_store_files_load_empty() {
    let dir = TestDir::new();
    dir.create_file("sessions.json", "  \n");
    dir.create_file("user-prompts.json", "");
    assert!(SessionStore::load(dir.file_path("sessions.json")).unwrap().is_empty());
    assert!(UserPromptStore::load(dir.file_path("user-prompts.json")).unwrap().list(None).is_empty());
}

#[test]
fn prompts_export_then_import_into_fresh_store() {
    let log = TestLogger::new("prompts_export_then_import_into_fresh_store");
    let dir = TestDir::new();

    let mut source = PromptStore::load(dir.file_path("a/system-prompts.json")).expect("load");
    source.set("coding", "You review Rust code.").expect("set");
    source.set("legal", "You summarize contracts.").expect("set");
    let exported = source
        .export(&dir.file_path("export.json"))
        .expect("export");
    assert_eq!(exported, DEFAULT_CATEGORIES.len() + 1);

    let mut target = PromptStore::load(dir.file_path("b/system-prompts.json")).expect("load");
    assert!(!target.contains("legal"));
    let imported = target.import(&dir.file_path("export.json")).expect("import");
    assert_eq!(imported, exported);

    let reloaded = PromptStore::load(dir.file_path("b/system-prompts.json")).expect("reload");
    assert_eq!(reloaded.get("coding"), "You review Rust code.");
    assert_eq!(reloaded.get("legal"), "You summarize contracts.");
    assert_eq!(reloaded.list_categories().last().map(String::as_str), Some("legal"));
    log.finish_ok();
}

#[test]
fn unknown_category_falls_back_to_other() {
    let dir = TestDir::new();
    let mut store = PromptStore::load(dir.file_path("system-prompts.json")).expect("load");
    assert_eq!(store.get("poetry"), store.get("other"));

    store.set("other", "Custom fallback").expect("set");
    assert_eq!(store.get("poetry"), "Custom fallback");
    assert!(!store.delete("other").expect("delete"));
}

#[test]
fn user_prompts_filter_by_category_after_reload() {
    let dir = TestDir::new();
    let path = dir.file_path("user-prompts.json");
    {
        let mut store = UserPromptStore::load(&path).expect("load");
        store.create("Refactor", "Refactor this function", "coding").expect("create");
        store.create("Headline", "Write a headline", "seo").expect("create");
        store.create("Misc", "Anything", "  ").expect("create");
    }

    let store = UserPromptStore::load(&path).expect("reload");
    assert_eq!(store.list(None).len(), 3);
    let coding = store.list(Some("CODING"));
    assert_eq!(coding.len(), 1);
    assert_eq!(coding[0].title, "Refactor");
    assert_eq!(store.list(Some("other"))[0].title, "Misc");
    assert!(store.exists("Write a headline"));
    assert!(!store.exists("write a headline"));
}

#[test]
fn file_credentials_round_trip() {
    let dir = TestDir::new();
    let store = FileCredentialStore::new(dir.file_path("config/credentials.json"));

    assert_eq!(store.get_key("openrouter").unwrap(), None);
    store.set_key("openrouter", "  sk-or-abc123  ").expect("set");
    store.set_key("brave", "brave-key").expect("set");

    let reopened = FileCredentialStore::new(dir.file_path("config/credentials.json"));
    assert_eq!(reopened.get_key("openrouter").unwrap().as_deref(), Some("sk-or-abc123"));
    assert_eq!(reopened.get_key("brave").unwrap().as_deref(), Some("brave-key"));
    assert!(reopened.set_key("openrouter", "   ").is_err());
    assert!(reopened.set_key("bing", "key").is_err());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(reopened.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
