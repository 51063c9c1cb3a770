use anyhow::{Context, Result};
use clap::Parser;
use rustle_posix::cli::{
    parse_module_args, print_documentation, print_module_list, print_probe_report, render_result,
    CliError, Commands, ExecutionOptions, OutputFormat, RustlePosixCli, RustlePosixCliImpl,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status when the module reports `failed`
const EXIT_FAILED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RustlePosixCli::parse();

    // Initialize tracing on stderr so stdout stays valid JSON
    let default_level = match cli.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting rustle-posix v{}", env!("CARGO_PKG_VERSION"));

    let options = ExecutionOptions::from(&cli);
    let app = RustlePosixCliImpl::new(&options).context("Failed to initialize")?;

    match cli.command {
        Commands::Run {
            module,
            args,
            args_json,
        } => {
            let module_args = parse_module_args(&args, args_json.as_deref())?;
            let result = app.run_module(&module, &module_args).await;
            println!("{}", render_result(&result)?);
            if result.failed {
                std::process::exit(EXIT_FAILED);
            }
        }
        Commands::Probe { format } => {
            let report = app.probe().await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print_probe_report(&report),
            }
        }
        Commands::Doc { module } => {
            let found = app
                .registry()
                .get_module(&module)
                .ok_or(CliError::UnknownModule { name: module })?;
            print_documentation(found.name(), &found.documentation());
        }
        Commands::List => print_module_list(&app.registry().list_modules()),
    }

    Ok(())
}
