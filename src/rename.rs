//! The rename-file dialog and the overwrite confirmation behind it.

use crate::dialog::{
    cancel_button, ok_button, warn_button, Dialog, DialogBody, DialogFocus, DialogHost, HostError,
};
use crate::docmanager::{Contents, DocumentError, DocumentManager};
use crate::form::{FormEngine, FormModel, FormOptions, FormView, IdAllocator};
use crate::path;
use serde_json::{json, Value as JsonValue};

/// Extra style class carried by file dialogs.
pub const FILE_DIALOG_CLASS: &str = "formedit-FileDialog";

/// Schema pattern for new names. Must agree with [`is_valid_file_name`].
pub const VALID_NAME_PATTERN: &str = r"^[^/\\:]+$";

#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error(
        "\"{name}\" is not a valid name for a file. Names must have nonzero length, and cannot include \"/\", \"\\\", or \":\""
    )]
    InvalidName { name: String },
    #[error("File not renamed")]
    NotRenamed,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The user dismissed the dialog.
    Cancelled,
    Renamed(Contents),
}

/// Non-empty and free of `/`, `\` and `:`.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\', ':'])
}

pub fn make_schema(old_path: &str) -> JsonValue {
    json!({
        "type": "object",
        "required": ["newPath"],
        "properties": {
            "oldPath": {
                "type": "string",
                "title": "File Path",
                "default": old_path,
                "readOnly": true
            },
            "newPath": {
                "type": "string",
                "title": "New Name",
                "default": path::basename(old_path),
                "pattern": VALID_NAME_PATTERN
            }
        }
    })
}

pub fn make_ui_schema() -> JsonValue {
    json!({"newPath": {"ui:autofocus": true}})
}

/// Ask for a new name for `old_path` and rename it within its directory.
pub fn rename_dialog<E: FormEngine>(
    manager: &dyn DocumentManager,
    host: &mut dyn DialogHost,
    ids: &IdAllocator,
    engine: E,
    old_path: &str,
) -> Result<RenameOutcome, RenameError> {
    let model = FormModel::new(FormOptions {
        schema: Some(make_schema(old_path)),
        ui_schema: Some(make_ui_schema()),
        form_data: Some(json!({
            "oldPath": old_path,
            "newPath": path::basename(old_path),
        })),
        class_name: Some(FILE_DIALOG_CLASS.into()),
        live_validate: Some(true),
        show_error_list: Some(false),
        ..Default::default()
    });
    let mut form = FormView::new(model, engine, ids);
    let result = host.show_dialog(Dialog {
        title: "Rename File".into(),
        body: DialogBody::Form(&mut form),
        buttons: vec![cancel_button(), ok_button("Rename")],
        focus: DialogFocus::Body,
    })?;
    if !result.accepted() {
        return Ok(RenameOutcome::Cancelled);
    }
    let Some(value) = result.value else {
        return Ok(RenameOutcome::Cancelled);
    };
    let new_name = value
        .form_data
        .get("newPath")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let new_path = path::join(&[path::dirname(old_path), &new_name]);
    if !value.errors.is_empty()
        || !is_valid_file_name(&new_name)
        || !is_sibling(old_path, &new_path, &new_name)
    {
        let err = RenameError::InvalidName { name: new_name };
        tracing::warn!(old_path, error = %err, "rename rejected");
        host.show_error_message("Rename Error", &err.to_string())?;
        return Err(err);
    }
    rename_file(manager, host, old_path, &new_path).map(RenameOutcome::Renamed)
}

/// `.` and `..` pass the name check but join to a parent directory.
fn is_sibling(old_path: &str, new_path: &str, new_name: &str) -> bool {
    path::dirname(new_path) == path::dirname(old_path) && path::basename(new_path) == new_name
}

/// Rename, asking before replacing an existing destination.
pub fn rename_file(
    manager: &dyn DocumentManager,
    host: &mut dyn DialogHost,
    old_path: &str,
    new_path: &str,
) -> Result<Contents, RenameError> {
    match manager.rename(old_path, new_path) {
        Ok(c) => Ok(c),
        Err(e) if e.is_conflict() => {
            if should_overwrite(host, new_path)? {
                Ok(manager.overwrite(old_path, new_path)?)
            } else {
                tracing::debug!(old_path, new_path, "overwrite declined");
                Err(RenameError::NotRenamed)
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub fn should_overwrite(host: &mut dyn DialogHost, path: &str) -> Result<bool, HostError> {
    let result = host.show_dialog(Dialog {
        title: "Overwrite file?".into(),
        body: DialogBody::Text(format!("\"{path}\" already exists, overwrite?")),
        buttons: vec![cancel_button(), warn_button("Overwrite")],
        focus: DialogFocus::DefaultButton,
    })?;
    Ok(result.accepted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{ScriptedKeys, TerminalDialogHost};
    use crate::docmanager::{ContentKind, FsDocumentManager};
    use crate::engine::{validate_value, TuiEngine};
    use crate::theme::Theme;
    use crossterm::event::KeyCode;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    /// Manager over a set of known paths that logs every call.
    #[derive(Default)]
    struct FakeManager {
        existing: RefCell<BTreeSet<String>>,
        calls: RefCell<Vec<(&'static str, String, String)>>,
    }

    impl FakeManager {
        fn with(paths: &[&str]) -> Self {
            let m = Self::default();
            m.existing.borrow_mut().extend(paths.iter().map(|p| p.to_string()));
            m
        }

        fn moved(&self, op: &'static str, old: &str, new: &str) -> Contents {
            self.calls.borrow_mut().push((op, old.into(), new.into()));
            let mut existing = self.existing.borrow_mut();
            existing.remove(old);
            existing.insert(new.into());
            Contents {
                name: path::basename(new).into(),
                path: new.into(),
                kind: ContentKind::File,
                size: None,
            }
        }
    }

    impl DocumentManager for FakeManager {
        fn rename(&self, old: &str, new: &str) -> Result<Contents, DocumentError> {
            if self.existing.borrow().contains(new) {
                self.calls.borrow_mut().push(("rename", old.into(), new.into()));
                return Err(DocumentError::Conflict { path: new.into() });
            }
            Ok(self.moved("rename", old, new))
        }
        fn overwrite(&self, old: &str, new: &str) -> Result<Contents, DocumentError> {
            Ok(self.moved("overwrite", old, new))
        }
    }

    fn host(keys: ScriptedKeys) -> TerminalDialogHost<TestBackend, ScriptedKeys> {
        let terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        TerminalDialogHost::new(terminal, keys, Theme::default())
    }

    fn backspaces(keys: ScriptedKeys, n: usize) -> ScriptedKeys {
        (0..n).fold(keys, |k, _| k.key(KeyCode::Backspace))
    }

    #[test]
    fn renames_to_sibling_path() {
        let mgr = FakeManager::with(&["notes.md"]);
        let keys = backspaces(ScriptedKeys::new(), 3).text("2.md").key(KeyCode::Enter);
        let mut h = host(keys);
        let out = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "notes.md").unwrap();
        let RenameOutcome::Renamed(c) = out else {
            panic!("expected a rename");
        };
        assert_eq!(c.path, "notes2.md");
        assert_eq!(
            *mgr.calls.borrow(),
            vec![("rename", "notes.md".to_string(), "notes2.md".to_string())]
        );
    }

    #[test]
    fn nested_rename_stays_in_directory() {
        let mgr = FakeManager::with(&["a/b/notes.md"]);
        let keys = backspaces(ScriptedKeys::new(), 3).text(".txt").key(KeyCode::Enter);
        let mut h = host(keys);
        rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "a/b/notes.md").unwrap();
        assert_eq!(mgr.calls.borrow()[0].2, "a/b/notes.txt");
    }

    #[test]
    fn slash_in_name_is_rejected_before_the_manager() {
        let mgr = FakeManager::with(&["notes.md"]);
        // type a slash, press Rename, then dismiss the error message
        let keys = ScriptedKeys::new().text("/").key(KeyCode::Enter).key(KeyCode::Enter);
        let mut h = host(keys);
        let err = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "notes.md")
            .unwrap_err();
        let RenameError::InvalidName { name } = &err else {
            panic!("expected InvalidName, got {err:?}");
        };
        assert_eq!(name, "notes.md/");
        let msg = err.to_string();
        assert!(msg.contains("\"/\"") && msg.contains("\"\\\"") && msg.contains("\":\""));
        assert!(mgr.calls.borrow().is_empty());
        assert_eq!(h.keys().remaining(), 0);
    }

    #[test]
    fn cancel_makes_no_manager_call() {
        let mgr = FakeManager::with(&["notes.md"]);
        let mut h = host(ScriptedKeys::new().key(KeyCode::Esc));
        let out = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "notes.md").unwrap();
        assert_eq!(out, RenameOutcome::Cancelled);
        assert!(mgr.calls.borrow().is_empty());
    }

    fn rename_onto_taken(confirm: KeyCode) -> (FakeManager, Result<RenameOutcome, RenameError>) {
        let mgr = FakeManager::with(&["dir/notes.md", "dir/taken.md"]);
        let keys = backspaces(ScriptedKeys::new(), "notes.md".len())
            .text("taken.md")
            .key(KeyCode::Enter)
            .key(confirm);
        let mut h = host(keys);
        let res = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "dir/notes.md");
        (mgr, res)
    }

    #[test]
    fn declining_overwrite_fails_without_overwriting() {
        let (mgr, res) = rename_onto_taken(KeyCode::Esc);
        assert!(matches!(res, Err(RenameError::NotRenamed)));
        assert!(mgr.calls.borrow().iter().all(|(op, _, _)| *op != "overwrite"));
    }

    #[test]
    fn accepting_overwrite_calls_it_exactly_once() {
        // the overwrite prompt starts focused on its Overwrite button
        let (mgr, res) = rename_onto_taken(KeyCode::Enter);
        assert!(matches!(res, Ok(RenameOutcome::Renamed(_))));
        let overwrites: Vec<_> = mgr
            .calls
            .borrow()
            .iter()
            .filter(|(op, _, _)| *op == "overwrite")
            .cloned()
            .collect();
        assert_eq!(
            overwrites,
            vec![("overwrite", "dir/notes.md".to_string(), "dir/taken.md".to_string())]
        );
    }

    fn rename_to(name: &str) -> ScriptedKeys {
        // clear "notes.md", type the name, press Rename, dismiss any error
        backspaces(ScriptedKeys::new(), "notes.md".len())
            .text(name)
            .key(KeyCode::Enter)
            .key(KeyCode::Enter)
    }

    #[test]
    fn dot_names_that_leave_the_directory_are_rejected() {
        for (old, name) in [("dir/notes.md", "."), ("dir/notes.md", ".."), ("notes.md", "."), ("notes.md", "..")] {
            let mgr = FakeManager::with(&[old, "dir"]);
            let mut h = host(rename_to(name));
            let err = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), old).unwrap_err();
            assert!(
                matches!(&err, RenameError::InvalidName { name: n } if n == name),
                "{old} -> {name}: {err:?}"
            );
            assert!(mgr.calls.borrow().is_empty(), "{old} -> {name} reached the manager");
        }
    }

    #[test]
    fn renaming_on_disk_keeps_the_directory_intact() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("dir")).unwrap();
        std::fs::write(tmp.path().join("dir/notes.md"), "hello").unwrap();
        std::fs::write(tmp.path().join("dir/other.md"), "other").unwrap();
        let mgr = FsDocumentManager::new(tmp.path());

        for name in [".", ".."] {
            // a trailing Enter would confirm an overwrite prompt if one appeared
            let mut h = host(rename_to(name).key(KeyCode::Enter));
            let err = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "dir/notes.md")
                .unwrap_err();
            assert!(matches!(err, RenameError::InvalidName { .. }));
            assert_eq!(h.keys().remaining(), 1);
        }
        assert!(tmp.path().join("dir/notes.md").exists());
        assert!(tmp.path().join("dir/other.md").exists());

        let mut h = host(backspaces(ScriptedKeys::new(), 3).text("txt").key(KeyCode::Enter));
        let out = rename_dialog(&mgr, &mut h, &IdAllocator::new(), TuiEngine::new(), "dir/notes.md").unwrap();
        let RenameOutcome::Renamed(c) = out else {
            panic!("expected a rename");
        };
        assert_eq!(c.path, "dir/notes.txt");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("dir/notes.txt")).unwrap(),
            "hello"
        );
        assert!(tmp.path().join("dir/other.md").exists());
    }

    #[test]
    fn other_manager_failures_propagate() {
        struct Broken;
        impl DocumentManager for Broken {
            fn rename(&self, _: &str, new: &str) -> Result<Contents, DocumentError> {
                Err(DocumentError::NotFound { path: new.into() })
            }
            fn overwrite(&self, _: &str, _: &str) -> Result<Contents, DocumentError> {
                unreachable!()
            }
        }
        let mut h = host(ScriptedKeys::new());
        let err = rename_file(&Broken, &mut h, "a", "b").unwrap_err();
        assert!(matches!(err, RenameError::Document(DocumentError::NotFound { .. })));
    }

    #[test]
    fn name_predicate_agrees_with_schema_pattern() {
        let schema = make_schema("dir/notes.md");
        let pattern = regex::Regex::new(
            schema["properties"]["newPath"]["pattern"].as_str().unwrap(),
        )
        .unwrap();
        let mut corpus: Vec<String> = vec![
            "".into(),
            "notes.md".into(),
            "a b c".into(),
            ".hidden".into(),
            "ünïcødé.txt".into(),
            ".".into(),
            "..".into(),
        ];
        for bad in ["/", "\\", ":"] {
            corpus.push(bad.into());
            corpus.push(format!("{bad}lead"));
            corpus.push(format!("trail{bad}"));
            corpus.push(format!("mid{bad}dle"));
        }
        corpus.push("a/b\\c:d".into());
        for name in &corpus {
            let valid = is_valid_file_name(name);
            assert_eq!(valid, pattern.is_match(name), "pattern disagrees on {name:?}");
            let errors = validate_value(&schema, &json!({"newPath": name}));
            assert_eq!(valid, errors.is_empty(), "schema disagrees on {name:?}");
        }
    }
}
