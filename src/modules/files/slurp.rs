//! slurp module - fetch a file's content from the target

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use super::backend::{backend_for, FileBackend};
use super::editor::split_lines;
use crate::channel::PathKind;
use crate::modules::{
    error::{ModuleError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
    probe::select_mode,
};

#[derive(Debug, Clone)]
pub struct SlurpArgs {
    pub src: String,
    pub force_raw: Option<bool>,
}

impl SlurpArgs {
    pub fn from_module_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        let src = args
            .get_string(&["src", "path"])?
            .ok_or_else(|| ValidationError::MissingRequiredArg {
                arg: "src".to_string(),
            })?;
        Ok(Self {
            src,
            force_raw: args.force_raw()?,
        })
    }
}

pub struct SlurpModule;

#[async_trait]
impl ExecutionModule for SlurpModule {
    fn name(&self) -> &'static str {
        "slurp"
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError> {
        let args = SlurpArgs::from_module_args(args)?;
        let mode = select_mode(args.force_raw, context).await;
        let backend = backend_for(mode, context.channel.as_ref());

        let mut result = ModuleResult::new(mode);
        if let Err(e) = slurp(backend.as_ref(), &args.src, &mut result).await {
            result.fail(e.to_string());
        }
        Ok(result)
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        SlurpArgs::from_module_args(args).map(|_| ())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Read a file from the target, natively or with cat".to_string(),
            arguments: vec![
                ArgumentSpec::new("src", "path", "File to read. Alias: path.").required(),
                ArgumentSpec::new("_force_raw", "bool", "Force (true) or forbid (false) the raw fallback. Probed when unset."),
            ],
            examples: vec![r#"slurp:
    src: /etc/hostname"#
                .to_string()],
            return_values: vec![
                ReturnValueSpec::new("content", "str", "success", "File content as text"),
                ReturnValueSpec::new("content_lines", "list", "success", "File content split into lines"),
                ReturnValueSpec::new("encoding", "str", "success", "Encoding of encoded, always base64"),
                ReturnValueSpec::new("encoded", "str", "success", "Base64 of the exact file bytes"),
                ReturnValueSpec::new("source", "str", "success", "The file that was read"),
            ],
        }
    }
}

async fn slurp(
    backend: &dyn FileBackend,
    src: &str,
    result: &mut ModuleResult,
) -> Result<(), ModuleError> {
    match backend.stat(src).await? {
        PathKind::File => {}
        PathKind::Missing => {
            result.fail(format!("file not found: {src}"));
            return Ok(());
        }
        PathKind::Directory => {
            result.fail(format!("source is a directory and must be a file: {src}"));
            return Ok(());
        }
        other => {
            result.fail(format!("source is a {other} and must be a file: {src}"));
            return Ok(());
        }
    }

    let bytes = backend.read(src).await?;
    debug!("Read {} bytes from {} ({})", bytes.len(), src, backend.mode());

    let content = String::from_utf8_lossy(&bytes).into_owned();
    result.insert_result("content_lines", split_lines(&content));
    result.insert_result("content", content);
    result.insert_result("encoding", "base64");
    result.insert_result("encoded", STANDARD.encode(&bytes));
    result.insert_result("source", src);
    Ok(())
}
