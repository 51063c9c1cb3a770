//! Test data builders for creating module arguments

use rustle_posix::modules::ModuleArgs;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Builder for command module test arguments
#[derive(Clone, Default)]
pub struct CommandTestBuilder {
    args: HashMap<String, Value>,
}

impl CommandTestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn argv(mut self, argv: &[&str]) -> Self {
        self.args.insert("argv".to_string(), json!(argv));
        self
    }

    pub fn cmd<S: Into<String>>(mut self, cmd: S) -> Self {
        self.args.insert("cmd".to_string(), Value::String(cmd.into()));
        self
    }

    pub fn shell(mut self) -> Self {
        self.args.insert("_uses_shell".to_string(), json!(true));
        self
    }

    pub fn chdir<S: Into<String>>(mut self, chdir: S) -> Self {
        self.args.insert("chdir".to_string(), Value::String(chdir.into()));
        self
    }

    pub fn creates<S: Into<String>>(mut self, path: S) -> Self {
        self.args.insert("creates".to_string(), Value::String(path.into()));
        self
    }

    pub fn removes<S: Into<String>>(mut self, path: S) -> Self {
        self.args.insert("removes".to_string(), Value::String(path.into()));
        self
    }

    pub fn stdin<S: Into<String>>(mut self, stdin: S) -> Self {
        self.args.insert("stdin".to_string(), Value::String(stdin.into()));
        self
    }

    pub fn expand_argument_vars(mut self, expand: bool) -> Self {
        self.args
            .insert("expand_argument_vars".to_string(), json!(expand));
        self
    }

    pub fn force_raw(mut self, force_raw: bool) -> Self {
        self.args.insert("_force_raw".to_string(), json!(force_raw));
        self
    }

    pub fn raw(self) -> Self {
        self.force_raw(true)
    }

    pub fn native(self) -> Self {
        self.force_raw(false)
    }

    pub fn build(self) -> ModuleArgs {
        ModuleArgs::from_map(self.args)
    }
}

/// Builder for lineinfile_dedupe module test arguments
#[derive(Clone, Default)]
pub struct LineInFileTestBuilder {
    args: HashMap<String, Value>,
}

impl LineInFileTestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.args.insert(key.to_string(), value);
        self
    }

    pub fn path<S: Into<String>>(self, path: S) -> Self {
        self.set("path", Value::String(path.into()))
    }

    pub fn line<S: Into<String>>(self, line: S) -> Self {
        self.set("line", Value::String(line.into()))
    }

    pub fn regexp<S: Into<String>>(self, regexp: S) -> Self {
        self.set("regexp", Value::String(regexp.into()))
    }

    pub fn search_string<S: Into<String>>(self, needle: S) -> Self {
        self.set("search_string", Value::String(needle.into()))
    }

    pub fn insertbefore<S: Into<String>>(self, anchor: S) -> Self {
        self.set("insertbefore", Value::String(anchor.into()))
    }

    pub fn insertafter<S: Into<String>>(self, anchor: S) -> Self {
        self.set("insertafter", Value::String(anchor.into()))
    }

    pub fn firstmatch(self) -> Self {
        self.set("firstmatch", json!(true))
    }

    pub fn dedupe(self, dedupe: bool) -> Self {
        self.set("dedupe", json!(dedupe))
    }

    pub fn backrefs(self) -> Self {
        self.set("backrefs", json!(true))
    }

    pub fn absent(self) -> Self {
        self.set("state", json!("absent"))
    }

    pub fn create(self) -> Self {
        self.set("create", json!(true))
    }

    pub fn backup(self) -> Self {
        self.set("backup", json!(true))
    }

    pub fn validate<S: Into<String>>(self, command: S) -> Self {
        self.set("validate", Value::String(command.into()))
    }

    pub fn mode<S: Into<String>>(self, mode: S) -> Self {
        self.set("mode", Value::String(mode.into()))
    }

    pub fn owner<S: Into<String>>(self, owner: S) -> Self {
        self.set("owner", Value::String(owner.into()))
    }

    pub fn group<S: Into<String>>(self, group: S) -> Self {
        self.set("group", Value::String(group.into()))
    }

    pub fn force_raw(self, force_raw: bool) -> Self {
        self.set("_force_raw", json!(force_raw))
    }

    pub fn raw(self) -> Self {
        self.force_raw(true)
    }

    pub fn native(self) -> Self {
        self.force_raw(false)
    }

    pub fn build(self) -> ModuleArgs {
        ModuleArgs::from_map(self.args)
    }
}

/// Builder for slurp module test arguments
#[derive(Clone, Default)]
pub struct SlurpTestBuilder {
    args: HashMap<String, Value>,
}

impl SlurpTestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src<S: Into<String>>(mut self, src: S) -> Self {
        self.args.insert("src".to_string(), Value::String(src.into()));
        self
    }

    pub fn raw(mut self) -> Self {
        self.args.insert("_force_raw".to_string(), json!(true));
        self
    }

    pub fn native(mut self) -> Self {
        self.args.insert("_force_raw".to_string(), json!(false));
        self
    }

    pub fn build(self) -> ModuleArgs {
        ModuleArgs::from_map(self.args)
    }
}
