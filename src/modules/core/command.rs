//! Command module - executes commands with a raw shell fallback

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::json;
use tracing::{debug, info};

use super::runner::{runner_for, CommandRunner};
use crate::channel::ChannelError;
use crate::config::ArgumentVarsSupport;
use crate::modules::{
    error::{ModuleError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs,
        ModuleDocumentation, ModuleResult, ReturnValueSpec,
    },
    probe::select_mode,
};

const RAW_EXPANSION_MISMATCH: &str = "Raw fallback requires expand_argument_vars and \
    _uses_shell to be the same. Shell-based execution expands variables remotely. If \
    expand_argument_vars is true but _uses_shell is false, the fallback cannot expand variables.";

/// Command arguments exactly as the caller supplied them
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    pub argv: Option<Vec<String>>,
    pub cmd: Option<String>,
    pub chdir: Option<String>,
    pub creates: Option<String>,
    pub removes: Option<String>,
    pub stdin: Option<String>,
    pub stdin_add_newline: bool,
    pub strip_empty_ends: bool,
    pub executable: Option<String>,
    pub uses_shell: bool,
    pub expand_argument_vars: Option<bool>,
    pub force_raw: Option<bool>,
}

impl CommandArgs {
    pub fn from_module_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Ok(Self {
            argv: args.get_string_list(&["argv"])?,
            cmd: args.get_string(&["cmd", "_raw_params"])?,
            chdir: args.get_string(&["chdir"])?,
            creates: args.get_string(&["creates"])?,
            removes: args.get_string(&["removes"])?,
            stdin: args.get_string(&["stdin"])?,
            stdin_add_newline: args.get_bool(&["stdin_add_newline"])?.unwrap_or(false),
            strip_empty_ends: args.get_bool(&["strip_empty_ends"])?.unwrap_or(false),
            executable: args.get_string(&["executable"])?,
            uses_shell: args.get_bool(&["_uses_shell"])?.unwrap_or(false),
            expand_argument_vars: args.get_bool(&["expand_argument_vars"])?,
            force_raw: args.force_raw()?,
        })
    }
}

/// What to run: a program with arguments, or a shell script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Argv(Vec<String>),
    Shell(String),
}

impl Default for CommandSpec {
    fn default() -> Self {
        CommandSpec::Argv(Vec::new())
    }
}

impl CommandSpec {
    /// Value reported as `cmd` in the result
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            CommandSpec::Argv(argv) => json!(argv),
            CommandSpec::Shell(script) => json!(script),
        }
    }
}

/// A validated command execution request
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub spec: CommandSpec,
    pub chdir: Option<String>,
    pub creates: Option<String>,
    pub removes: Option<String>,
    pub stdin: Option<Vec<u8>>,
    pub strip_empty_ends: bool,
    /// Shell interpreter, only kept for shell commands
    pub executable: Option<String>,
    /// Expand `$VAR` and `~` in argv elements before spawning
    pub expand_vars: bool,
    /// Expansion was requested without a shell, which raw mode cannot honour
    pub expansion_mismatch: bool,
    pub force_raw: Option<bool>,
    pub warnings: Vec<String>,
}

impl CommandRequest {
    pub fn from_args(
        args: CommandArgs,
        argument_vars: ArgumentVarsSupport,
    ) -> Result<Self, ValidationError> {
        let mut warnings = Vec::new();

        if args.argv.is_some() && args.cmd.is_some() {
            return Err(ValidationError::exclusive(&["cmd", "argv"]));
        }

        if args.expand_argument_vars.is_some()
            && argument_vars == ArgumentVarsSupport::Unsupported
        {
            return Err(ValidationError::Unsupported {
                message: "expand_argument_vars is not supported by the configured runtime"
                    .to_string(),
            });
        }

        if args.uses_shell && args.expand_argument_vars == Some(false) {
            return Err(ValidationError::requirement(
                "expand_argument_vars=false cannot be honoured with _uses_shell=true, \
                 the shell always expands variables",
            ));
        }

        let spec = match (args.argv, args.cmd) {
            (Some(argv), None) if argv.is_empty() => {
                return Err(ValidationError::InvalidArgValue {
                    arg: "argv".to_string(),
                    value: "[]".to_string(),
                    reason: "argv must not be empty".to_string(),
                })
            }
            (None, Some(cmd)) if cmd.trim().is_empty() => {
                return Err(ValidationError::InvalidArgValue {
                    arg: "cmd".to_string(),
                    value: cmd,
                    reason: "cmd must not be empty".to_string(),
                })
            }
            (Some(argv), None) if args.uses_shell => CommandSpec::Shell(shell_words::join(argv)),
            (Some(argv), None) => CommandSpec::Argv(argv),
            (None, Some(cmd)) if args.uses_shell => CommandSpec::Shell(cmd),
            (None, Some(cmd)) => {
                let argv = shell_words::split(&cmd).map_err(|e| ValidationError::InvalidArgValue {
                    arg: "cmd".to_string(),
                    value: cmd.clone(),
                    reason: e.to_string(),
                })?;
                CommandSpec::Argv(argv)
            }
            _ => return Err(ValidationError::one_of(&["cmd", "argv"])),
        };

        let executable = match args.executable {
            Some(executable) if !args.uses_shell => {
                warnings.push(format!(
                    "The parameter 'executable' is only used with _uses_shell. \
                     Not using '{executable}'."
                ));
                None
            }
            other => other,
        };

        let stdin = args.stdin.map(|mut stdin| {
            if args.stdin_add_newline && !stdin.is_empty() && !stdin.ends_with('\n') {
                stdin.push('\n');
            }
            stdin.into_bytes()
        });

        let expand = args.expand_argument_vars.unwrap_or(args.uses_shell);

        Ok(Self {
            spec,
            chdir: args.chdir,
            creates: args.creates,
            removes: args.removes,
            stdin,
            strip_empty_ends: args.strip_empty_ends,
            executable,
            expand_vars: expand && !args.uses_shell,
            expansion_mismatch: expand != args.uses_shell,
            force_raw: args.force_raw,
            warnings,
        })
    }

    pub fn from_module_args(
        args: &ModuleArgs,
        argument_vars: ArgumentVarsSupport,
    ) -> Result<Self, ValidationError> {
        Self::from_args(CommandArgs::from_module_args(args)?, argument_vars)
    }

    /// Native expansion needs the target's environment
    pub fn needs_target_env(&self) -> bool {
        self.expand_vars && matches!(self.spec, CommandSpec::Argv(_))
    }
}

/// Command module - executes commands natively or through the raw shell
pub struct CommandModule;

#[async_trait]
impl ExecutionModule for CommandModule {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError> {
        let request = CommandRequest::from_module_args(args, context.config.argument_vars)?;
        let mode = select_mode(request.force_raw, context).await;

        let mut result = ModuleResult::new(mode);
        result.warnings = request.warnings.clone();
        result.insert_result("cmd", request.spec.to_value());

        if mode.is_raw() && request.expansion_mismatch {
            result.fail(RAW_EXPANSION_MISMATCH);
            return Ok(result);
        }

        let runner = runner_for(mode, context.channel.as_ref());
        run_command(runner.as_ref(), &request, context, result).await
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        // Config-dependent checks happen in execute
        CommandRequest::from_module_args(args, ArgumentVarsSupport::Supported).map(|_| ())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Execute a command on the target, falling back to raw POSIX shell \
                          execution when the native runtime is unavailable"
                .to_string(),
            arguments: vec![
                ArgumentSpec::new("argv", "list", "Command as a list of arguments. Mutually exclusive with cmd."),
                ArgumentSpec::new("cmd", "str", "Command as a string, split into arguments unless _uses_shell."),
                ArgumentSpec::new("chdir", "path", "Change into this directory before running the command."),
                ArgumentSpec::new("creates", "path", "If this path exists, the command is not run."),
                ArgumentSpec::new("removes", "path", "If this path does not exist, the command is not run."),
                ArgumentSpec::new("stdin", "str", "Data passed to the command on standard input."),
                ArgumentSpec::new("stdin_add_newline", "bool", "Append a newline to stdin data.")
                    .default_value("false"),
                ArgumentSpec::new("strip_empty_ends", "bool", "Strip trailing newlines from stdout and stderr.")
                    .default_value("false"),
                ArgumentSpec::new("executable", "path", "Shell used with _uses_shell."),
                ArgumentSpec::new("_uses_shell", "bool", "Run cmd through the target's shell.")
                    .default_value("false"),
                ArgumentSpec::new("expand_argument_vars", "bool", "Expand environment variables in arguments. Follows _uses_shell when unset."),
                ArgumentSpec::new("_force_raw", "bool", "Force (true) or forbid (false) the raw fallback. Probed when unset."),
            ],
            examples: vec![
                r#"command:
    argv: [/usr/bin/make, install]
    chdir: /srv/app
    creates: /usr/local/bin/app"#
                    .to_string(),
                r#"command:
    cmd: echo $HOME > /tmp/home
    _uses_shell: true
    _force_raw: true"#
                    .to_string(),
            ],
            return_values: vec![
                ReturnValueSpec::new("rc", "int", "always", "Return code of the command"),
                ReturnValueSpec::new("stdout", "str", "always", "Standard output"),
                ReturnValueSpec::new("stdout_lines", "list", "always", "Standard output split into lines"),
                ReturnValueSpec::new("stderr", "str", "always", "Standard error"),
                ReturnValueSpec::new("stderr_lines", "list", "always", "Standard error split into lines"),
                ReturnValueSpec::new("raw", "bool", "always", "Whether the raw fallback ran the command"),
                ReturnValueSpec::new("cmd", "list or str", "always", "The command that was run"),
                ReturnValueSpec::new("start", "str", "when run", "Start time"),
                ReturnValueSpec::new("end", "str", "when run", "End time"),
                ReturnValueSpec::new("delta", "str", "when run", "Elapsed time"),
            ],
        }
    }
}

/// Gate, simulate or run a validated request. Every decision is made the
/// same way whichever runner is supplied.
pub async fn run_command(
    runner: &dyn CommandRunner,
    request: &CommandRequest,
    context: &ExecutionContext,
    mut result: ModuleResult,
) -> Result<ModuleResult, ModuleError> {
    let shoulda = if context.check_mode { "Would" } else { "Did" };

    if let Some(chdir) = &request.chdir {
        match runner.is_directory(chdir).await {
            Ok(true) => {}
            Ok(false) => {
                result.fail(format!(
                    "Unable to change directory before execution: {chdir}"
                ));
                return Ok(result);
            }
            Err(e) => return Ok(channel_failure(result, e)),
        }
    }

    if let Some(creates) = &request.creates {
        match runner.path_exists(creates).await {
            Ok(true) => {
                result.set_output(0, String::new(), String::new());
                result.msg = Some(format!("{shoulda} not run command since '{creates}' exists"));
                return Ok(result);
            }
            Ok(false) => {}
            Err(e) => return Ok(channel_failure(result, e)),
        }
    }

    if let Some(removes) = &request.removes {
        match runner.path_exists(removes).await {
            Ok(false) => {
                result.set_output(0, String::new(), String::new());
                result.msg = Some(format!(
                    "{shoulda} not run command since '{removes}' does not exist"
                ));
                return Ok(result);
            }
            Ok(true) => {}
            Err(e) => return Ok(channel_failure(result, e)),
        }
    }

    if context.check_mode {
        let gated = request.creates.is_some() || request.removes.is_some();
        result.set_output(0, String::new(), String::new());
        result.changed = gated;
        result.skipped = !gated;
        result.msg = Some("Command would have run if not in check mode".to_string());
        return Ok(result);
    }

    info!(
        "Running {} command on {}: {:?}",
        runner.mode(),
        context.host_info.hostname,
        request.spec
    );

    let start = Local::now();
    let outcome = runner.run(request, &context.environment).await;
    let end = Local::now();
    record_timing(&mut result, start, end);
    result.changed = true;

    match outcome {
        Ok(output) => {
            let (mut stdout, mut stderr) = (output.stdout_text(), output.stderr_text());
            if request.strip_empty_ends {
                stdout = stdout.trim_end_matches(['\r', '\n']).to_string();
                stderr = stderr.trim_end_matches(['\r', '\n']).to_string();
            }
            debug!("Command exited with rc {}", output.rc);
            result.set_output(output.rc, stdout, stderr);
            if output.rc != 0 {
                result.fail("non-zero return code");
            }
        }
        Err(e) => {
            // Spawn failures report the rc a shell would have produced
            if let Some(rc) = e.shell_exit_code() {
                result.set_output(rc, String::new(), e.to_string());
            }
            result.fail(e.to_string());
        }
    }

    Ok(result)
}

fn channel_failure(mut result: ModuleResult, error: ChannelError) -> ModuleResult {
    result.fail(error.to_string());
    result
}

fn record_timing(result: &mut ModuleResult, start: DateTime<Local>, end: DateTime<Local>) {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
    result.insert_result("start", start.format(FORMAT).to_string());
    result.insert_result("end", end.format(FORMAT).to_string());
    result.insert_result("delta", format_delta(end - start));
}

/// `H:MM:SS.ffffff`
pub fn format_delta(delta: chrono::TimeDelta) -> String {
    let micros = delta.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = micros / 1_000_000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        micros % 1_000_000
    )
}
