//! lineinfile_dedupe module - ensure a line is present once, or absent

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::backend::{apply_permissions, backend_for, FileBackend};
use super::editor::{plan_edit, render_lines, split_lines, Anchor, EditState, LineEdit, Selector};
use super::utils::{checksum_bytes, parse_mode, ChecksumAlgorithm, FilePermissions};
use crate::channel::PathKind;
use crate::modules::{
    error::{ModuleError, ValidationError},
    interface::{
        ArgumentSpec, Diff, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
    probe::select_mode,
};

/// Exit code reported when the destination exists but is not a regular file
pub const RC_NOT_A_FILE: i32 = 256;
/// Exit code reported when the destination is missing and `create` is off
pub const RC_MISSING_DESTINATION: i32 = 257;

const PERMISSIONS_CHANGED: &str = "ownership or perms changed";

/// Arguments exactly as the caller supplied them
#[derive(Debug, Clone, Default)]
pub struct LineInFileArgs {
    pub path: Option<String>,
    pub line: Option<String>,
    pub regexp: Option<String>,
    pub search_string: Option<String>,
    pub insertbefore: Option<String>,
    pub insertafter: Option<String>,
    pub firstmatch: bool,
    pub dedupe: bool,
    pub backrefs: bool,
    pub state: Option<String>,
    pub create: bool,
    pub backup: bool,
    pub validate: Option<String>,
    pub mode: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub force_raw: Option<bool>,
}

impl LineInFileArgs {
    pub fn from_module_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Ok(Self {
            path: args.get_string(&["path", "dest", "destfile", "name"])?,
            line: args.get_string(&["line", "value"])?,
            regexp: args.get_string(&["regexp", "regex"])?,
            search_string: args.get_string(&["search_string"])?,
            insertbefore: args.get_string(&["insertbefore"])?,
            insertafter: args.get_string(&["insertafter"])?,
            firstmatch: args.get_bool(&["firstmatch"])?.unwrap_or(false),
            dedupe: args.get_bool(&["dedupe"])?.unwrap_or(true),
            backrefs: args.get_bool(&["backrefs"])?.unwrap_or(false),
            state: args.get_string(&["state"])?,
            create: args.get_bool(&["create"])?.unwrap_or(false),
            backup: args.get_bool(&["backup"])?.unwrap_or(false),
            validate: args.get_string(&["validate"])?,
            mode: args.get_string(&["mode"])?,
            owner: args.get_string(&["owner"])?,
            group: args.get_string(&["group"])?,
            force_raw: args.force_raw()?,
        })
    }
}

/// A fully validated lineinfile request
#[derive(Debug, Clone)]
pub struct LineInFileRequest {
    pub path: String,
    pub edit: LineEdit,
    pub create: bool,
    pub backup: bool,
    pub validate: Option<String>,
    pub permissions: FilePermissions,
    pub force_raw: Option<bool>,
    pub warnings: Vec<String>,
}

fn compile(arg: &str, pattern: &str) -> Result<Regex, ValidationError> {
    Regex::new(pattern).map_err(|source| ValidationError::InvalidPattern {
        arg: arg.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

impl LineInFileRequest {
    pub fn from_args(args: LineInFileArgs) -> Result<Self, ValidationError> {
        let mut warnings = Vec::new();

        let path = args.path.ok_or_else(|| ValidationError::MissingRequiredArg {
            arg: "path".to_string(),
        })?;

        let state = match args.state.as_deref() {
            None | Some("present") => EditState::Present,
            Some("absent") => EditState::Absent,
            Some(other) => {
                return Err(ValidationError::InvalidArgValue {
                    arg: "state".to_string(),
                    value: other.to_string(),
                    reason: "expected present or absent".to_string(),
                })
            }
        };

        if args.regexp.is_some() && args.search_string.is_some() {
            return Err(ValidationError::exclusive(&["regexp", "search_string"]));
        }
        if args.insertbefore.is_some() && args.insertafter.is_some() {
            return Err(ValidationError::exclusive(&["insertbefore", "insertafter"]));
        }
        if args.backrefs && args.search_string.is_some() {
            return Err(ValidationError::exclusive(&["backrefs", "search_string"]));
        }

        let has_selector = args.regexp.is_some() || args.search_string.is_some();
        match state {
            EditState::Present => {
                if args.backrefs && args.regexp.is_none() {
                    return Err(ValidationError::requirement(
                        "regexp is required with backrefs=true",
                    ));
                }
                let pure_dedupe = args.dedupe && has_selector && !args.backrefs;
                if args.line.is_none() && !pure_dedupe {
                    return Err(ValidationError::requirement(
                        "line is required with state=present",
                    ));
                }
            }
            EditState::Absent => {
                if args.line.is_none() && !has_selector {
                    return Err(ValidationError::requirement(
                        "one of line, search_string, or regexp is required with state=absent",
                    ));
                }
            }
        }

        if let Some(validate) = &args.validate {
            if !validate.contains("%s") {
                return Err(ValidationError::InvalidArgValue {
                    arg: "validate".to_string(),
                    value: validate.clone(),
                    reason: "validate must contain %s".to_string(),
                });
            }
        }

        let mode = match args.mode.as_deref() {
            None => None,
            Some(value) => Some(parse_mode(value).ok_or_else(|| {
                ValidationError::InvalidArgValue {
                    arg: "mode".to_string(),
                    value: value.to_string(),
                    reason: "expected octal permission bits such as 0644".to_string(),
                }
            })?),
        };
        let permissions = FilePermissions {
            mode,
            owner: args.owner.filter(|owner| !owner.is_empty()),
            group: args.group.filter(|group| !group.is_empty()),
        };

        let selector = match (&args.regexp, &args.search_string) {
            (Some(pattern), _) => {
                if pattern.is_empty() {
                    warnings.push(empty_selector_warning("regexp"));
                }
                Selector::Regex(compile("regexp", pattern)?)
            }
            (None, Some(needle)) => {
                if needle.is_empty() {
                    warnings.push(empty_selector_warning("search_string"));
                }
                Selector::SearchString(needle.clone())
            }
            (None, None) => Selector::Literal,
        };

        let anchor = match (args.insertbefore.as_deref(), args.insertafter.as_deref()) {
            (Some("BOF"), _) | (_, Some("BOF")) => Anchor::Bof,
            (Some(pattern), _) => Anchor::Before(compile("insertbefore", pattern)?),
            (_, Some("EOF")) | (None, None) => Anchor::Eof,
            (None, Some(pattern)) => Anchor::After(compile("insertafter", pattern)?),
        };

        Ok(Self {
            path,
            edit: LineEdit {
                selector,
                line: args.line,
                anchor,
                state,
                firstmatch: args.firstmatch,
                dedupe: args.dedupe,
                backrefs: args.backrefs,
            },
            create: args.create,
            backup: args.backup,
            validate: args.validate,
            permissions,
            force_raw: args.force_raw,
            warnings,
        })
    }

    pub fn from_module_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Self::from_args(LineInFileArgs::from_module_args(args)?)
    }
}

fn empty_selector_warning(arg: &str) -> String {
    format!(
        "The {arg} is an empty string, which will match every line in the file. \
         This may have unintended consequences, such as replacing the last line \
         in the file rather than appending."
    )
}

/// lineinfile_dedupe module - line management with duplicate removal
pub struct LineInFileModule;

#[async_trait]
impl ExecutionModule for LineInFileModule {
    fn name(&self) -> &'static str {
        "lineinfile_dedupe"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["lineinfile"]
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError> {
        let request = LineInFileRequest::from_module_args(args)?;
        let mode = select_mode(request.force_raw, context).await;
        let backend = backend_for(mode, context.channel.as_ref());

        let mut result = ModuleResult::new(mode);
        result.warnings = request.warnings.clone();

        match edit_file(backend.as_ref(), &request, context, &mut result).await {
            Ok(()) => Ok(result),
            Err(e) => {
                result.fail(e.to_string());
                Ok(result)
            }
        }
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        LineInFileRequest::from_module_args(args).map(|_| ())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Ensure a line is present in a file exactly once, or remove matching \
                          lines, using only POSIX shell when the native runtime is unavailable"
                .to_string(),
            arguments: vec![
                ArgumentSpec::new("path", "path", "File to modify. Aliases: dest, destfile, name.")
                    .required(),
                ArgumentSpec::new("line", "str", "The line to insert or replace with. Alias: value."),
                ArgumentSpec::new("regexp", "str", "Regular expression selecting lines to replace or remove. Alias: regex."),
                ArgumentSpec::new("search_string", "str", "Literal substring selecting lines to replace or remove."),
                ArgumentSpec::new("insertbefore", "str", "Insert before the line matching this pattern, or BOF."),
                ArgumentSpec::new("insertafter", "str", "Insert after the line matching this pattern, or EOF.")
                    .default_value("EOF"),
                ArgumentSpec::new("firstmatch", "bool", "Use the first match instead of the last.")
                    .default_value("false"),
                ArgumentSpec::new("dedupe", "bool", "Remove duplicates of the line and of selector matches.")
                    .default_value("true"),
                ArgumentSpec::new("backrefs", "bool", "Expand regexp back-references in line. Never inserts.")
                    .default_value("false"),
                ArgumentSpec::new("state", "str", "present or absent.").default_value("present"),
                ArgumentSpec::new("create", "bool", "Create the file when missing.")
                    .default_value("false"),
                ArgumentSpec::new("backup", "bool", "Keep a timestamped copy of the original file.")
                    .default_value("false"),
                ArgumentSpec::new("validate", "str", "Command run against the staged file, %s is its path."),
                ArgumentSpec::new("mode", "str", "Octal permission bits of the file, such as 0644."),
                ArgumentSpec::new("owner", "str", "User name or uid that should own the file."),
                ArgumentSpec::new("group", "str", "Group name or gid that should own the file."),
                ArgumentSpec::new("_force_raw", "bool", "Force (true) or forbid (false) the raw fallback. Probed when unset."),
            ],
            examples: vec![
                r#"lineinfile_dedupe:
    path: /etc/ssh/sshd_config
    regexp: '^#?PermitRootLogin'
    line: PermitRootLogin no"#
                    .to_string(),
                r#"lineinfile_dedupe:
    path: /etc/hosts
    search_string: 10.0.0.5
    state: absent"#
                    .to_string(),
            ],
            return_values: vec![
                ReturnValueSpec::new("changed", "bool", "always", "Whether the file was (or would be) modified"),
                ReturnValueSpec::new("msg", "str", "always", "What was done"),
                ReturnValueSpec::new("raw", "bool", "always", "Whether the raw fallback edited the file"),
                ReturnValueSpec::new("found", "int", "state=absent", "Number of lines removed"),
                ReturnValueSpec::new("backup_file", "str", "when backup=true and changed", "Backup location"),
                ReturnValueSpec::new("checksum", "str", "when written", "SHA-1 of the new content"),
            ],
        }
    }
}

/// Read, plan and (unless in check mode) write one edit through `backend`
pub async fn edit_file(
    backend: &dyn FileBackend,
    request: &LineInFileRequest,
    context: &ExecutionContext,
    result: &mut ModuleResult,
) -> Result<(), ModuleError> {
    let path = request.path.as_str();
    let kind = backend.stat(path).await?;

    match kind {
        PathKind::File => {}
        PathKind::Missing if request.edit.state == EditState::Absent => {
            result.msg = Some("file not present".to_string());
            result.insert_result("found", 0);
            return Ok(());
        }
        PathKind::Missing if !request.create => {
            result.rc = Some(RC_MISSING_DESTINATION);
            result.fail(format!("Destination {path} does not exist!"));
            return Ok(());
        }
        PathKind::Missing => {}
        other => {
            result.rc = Some(RC_NOT_A_FILE);
            result.fail(format!("Path {path} is a {other}!"));
            return Ok(());
        }
    }

    let before = if kind.exists() {
        match String::from_utf8(backend.read(path).await?) {
            Ok(text) => text,
            Err(_) => {
                result.fail(format!("file is not valid UTF-8: {path}"));
                return Ok(());
            }
        }
    } else {
        String::new()
    };

    let permissions = &request.permissions;
    let drift = if kind.exists() && !permissions.is_empty() {
        permissions.differs_from(&backend.attributes(path).await?)
    } else {
        false
    };

    let plan = plan_edit(&split_lines(&before), &request.edit);
    result.changed = plan.changed || drift;
    if let Some(found) = plan.found {
        result.insert_result("found", found);
    }
    debug!(
        "Planned edit of {} ({}): {:?}, {} deduped",
        path,
        backend.mode(),
        plan.action,
        plan.deduped
    );

    let after = render_lines(&plan.lines);
    if context.diff_mode && plan.changed {
        result.diff = Some(Diff::between(path, &before, &after));
    }

    if context.check_mode {
        result.msg = Some(
            if result.changed {
                "Check mode: changes would have been made."
            } else {
                "Check mode: no changes needed."
            }
            .to_string(),
        );
        return Ok(());
    }

    result.msg = Some(plan.msg.clone());
    if plan.changed {
        if !write_content(backend, request, kind, after, result).await? {
            return Ok(());
        }
        info!("Edited {} ({}): {}", path, backend.mode(), plan.msg);
    }

    if drift || (!kind.exists() && !permissions.is_empty()) {
        apply_permissions(backend, path, permissions).await?;
        if drift {
            result.msg = Some(if plan.msg.is_empty() {
                PERMISSIONS_CHANGED.to_string()
            } else {
                format!("{} and {PERMISSIONS_CHANGED}", plan.msg)
            });
            info!("Updated permissions of {} ({})", path, backend.mode());
        }
    }
    Ok(())
}

/// Stage, validate, back up and commit `after`. Returns false when validation
/// rejected the content and the destination was left untouched.
async fn write_content(
    backend: &dyn FileBackend,
    request: &LineInFileRequest,
    kind: PathKind,
    after: String,
    result: &mut ModuleResult,
) -> Result<bool, ModuleError> {
    let path = request.path.as_str();
    if !kind.exists() {
        backend.create_parent_dirs(path).await?;
    }

    let content = after.into_bytes();
    let staged = backend.stage(path, &content).await?;

    if let Some(validate) = &request.validate {
        let output = match backend.validate(validate, &staged).await {
            Ok(output) => output,
            Err(e) => {
                backend.discard(&staged).await;
                return Err(e.into());
            }
        };
        if !output.success() {
            backend.discard(&staged).await;
            result.changed = false;
            result.set_output(output.rc, output.stdout_text(), output.stderr_text());
            result.fail("failed to validate");
            return Ok(false);
        }
    }

    if request.backup && kind.exists() {
        match backend.backup(path).await {
            Ok(backup_file) => result.insert_result("backup_file", backup_file),
            Err(e) => {
                backend.discard(&staged).await;
                return Err(e.into());
            }
        }
    }

    if let Err(e) = backend.commit(&staged, path).await {
        backend.discard(&staged).await;
        return Err(e.into());
    }

    result.insert_result(
        "checksum",
        checksum_bytes(&content, ChecksumAlgorithm::Sha1),
    );
    Ok(true)
}
