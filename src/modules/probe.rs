//! Native runtime detection and execution mode selection

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelRequest};
use crate::config::PosixConfig;
use crate::modules::interface::{ExecMode, ExecutionContext};

/// Outcome of probing a target for the native runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub mode: ExecMode,
    pub runtime: String,
    /// First line of the `--version` banner
    pub banner: Option<String>,
    /// Resolved interpreter path, only known for local targets
    pub path: Option<PathBuf>,
    /// Why the native path was rejected
    pub reason: Option<String>,
}

impl ProbeReport {
    fn raw(runtime: &str, reason: String) -> Self {
        Self {
            mode: ExecMode::Raw,
            runtime: runtime.to_string(),
            banner: None,
            path: None,
            reason: Some(reason),
        }
    }
}

/// Run `<native_runtime> --version` on the target and decide the mode
pub async fn probe(channel: &dyn Channel, config: &PosixConfig) -> ProbeReport {
    let runtime = config.native_runtime.as_str();
    let mut argv = shell_words::split(runtime).unwrap_or_else(|_| vec![runtime.to_string()]);
    if argv.is_empty() {
        return ProbeReport::raw(runtime, "no native runtime configured".to_string());
    }
    let program = argv[0].clone();
    argv.push("--version".to_string());

    debug!("Probing {} for native runtime: {}", channel.host(), runtime);
    let request = ChannelRequest::argv(argv);
    let output = match tokio::time::timeout(config.probe_timeout(), channel.run(request)).await {
        Err(_) => {
            return ProbeReport::raw(
                runtime,
                format!(
                    "probe timed out after {}s",
                    config.probe_timeout().as_secs()
                ),
            )
        }
        Ok(Err(e)) => return ProbeReport::raw(runtime, e.to_string()),
        Ok(Ok(output)) => output,
    };

    if !output.success() {
        return ProbeReport::raw(runtime, format!("exited with rc {}", output.rc));
    }

    // Older interpreters print their banner on stderr
    let stdout = output.stdout_text();
    let stderr = output.stderr_text();
    let banner = [stdout.trim(), stderr.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .and_then(|text| text.lines().next())
        .map(str::to_string);

    let Some(banner) = banner else {
        return ProbeReport::raw(runtime, "empty version banner".to_string());
    };

    let path = if channel.host() == "localhost" {
        which::which(&program).ok()
    } else {
        None
    };

    debug!("Native runtime available on {}: {}", channel.host(), banner);
    ProbeReport {
        mode: ExecMode::Native,
        runtime: runtime.to_string(),
        banner: Some(banner),
        path,
        reason: None,
    }
}

/// Pick the execution mode for one operation. An explicit `_force_raw`
/// wins; otherwise the target is probed.
pub async fn select_mode(force_raw: Option<bool>, context: &ExecutionContext) -> ExecMode {
    match force_raw {
        Some(true) => {
            debug!("Raw mode forced for {}", context.host_info.hostname);
            ExecMode::Raw
        }
        Some(false) => ExecMode::Native,
        None => {
            let report = probe(context.channel.as_ref(), &context.config).await;
            if let Some(reason) = &report.reason {
                warn!(
                    "Native runtime '{}' unavailable on {} ({}), falling back to raw mode",
                    report.runtime, context.host_info.hostname, reason
                );
            }
            report.mode
        }
    }
}
