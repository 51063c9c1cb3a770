//! Central registry for all execution modules

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::modules::{
    error::ModuleError,
    interface::{ExecMode, ExecutionContext, ExecutionModule, ModuleArgs, ModuleResult},
};

/// Central registry for all execution modules
pub struct ModuleRegistry {
    modules: HashMap<String, Box<dyn ExecutionModule>>,
    aliases: HashMap<String, String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a registry with all core modules pre-registered
    pub fn with_core_modules() -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(crate::modules::core::CommandModule));
        registry.register(Box::new(crate::modules::files::LineInFileModule));
        registry.register(Box::new(crate::modules::files::SlurpModule));

        registry
    }

    pub fn register(&mut self, module: Box<dyn ExecutionModule>) {
        let name = module.name().to_string();
        for alias in module.aliases() {
            self.aliases.insert(alias.to_string(), name.clone());
        }
        self.modules.insert(name, module);
    }

    pub fn get_module(&self, name: &str) -> Option<&dyn ExecutionModule> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.modules.get(name).map(|m| m.as_ref())
    }

    pub fn list_modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub async fn execute_module(
        &self,
        module_name: &str,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError> {
        let module = self
            .get_module(module_name)
            .ok_or_else(|| ModuleError::ModuleNotFound {
                name: module_name.to_string(),
            })?;

        debug!(
            "Executing module {} on {} (check_mode={})",
            module.name(),
            context.host_info.hostname,
            context.check_mode
        );
        module.validate_args(args)?;

        if context.check_mode {
            module.check_mode(args, context).await
        } else {
            module.execute(args, context).await
        }
    }

    /// Like [`execute_module`](Self::execute_module) but always yields a
    /// result. Errors become failed results reporting the forced mode.
    pub async fn run(
        &self,
        module_name: &str,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> ModuleResult {
        match self.execute_module(module_name, args, context).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Module {} failed: {}", module_name, e);
                let mode = match args.force_raw() {
                    Ok(Some(true)) => ExecMode::Raw,
                    _ => ExecMode::Native,
                };
                ModuleResult::failure(mode, e.to_string())
            }
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
