use crate::modules::{ModuleDocumentation, ModuleResult, ProbeReport};

/// Render a module result as pretty JSON
pub fn render_result(result: &ModuleResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Print probe report in human-readable format
pub fn print_probe_report(report: &ProbeReport) {
    println!("🔎 Native Runtime Probe");
    println!("=======================");
    println!();

    if report.mode.is_raw() {
        println!("⚠️  Mode: raw - commands run as POSIX shell one-liners");
    } else {
        println!("✅ Mode: native");
    }
    println!("  Runtime: {}", report.runtime);
    if let Some(banner) = &report.banner {
        println!("  Version: {banner}");
    }
    if let Some(path) = &report.path {
        println!("  Path: {}", path.display());
    }
    if let Some(reason) = &report.reason {
        println!("  Reason: {reason}");
    }
}

pub fn print_module_list(names: &[&str]) {
    println!("📦 Modules ({}):", names.len());
    for name in names {
        println!("  • {name}");
    }
}

pub fn print_documentation(name: &str, doc: &ModuleDocumentation) {
    println!("{name}");
    println!("{}", "=".repeat(name.len()));
    println!();
    println!("{}", doc.description);
    println!();

    println!("Arguments:");
    for arg in &doc.arguments {
        let mut line = format!("  {} ({})", arg.name, arg.argument_type);
        if arg.required {
            line.push_str(" [required]");
        }
        if let Some(default) = &arg.default {
            line.push_str(&format!(" [default: {default}]"));
        }
        println!("{line}");
        println!("      {}", arg.description);
    }

    if !doc.return_values.is_empty() {
        println!();
        println!("Returns:");
        for value in &doc.return_values {
            println!(
                "  {} ({}, {}): {}",
                value.name, value.value_type, value.returned, value.description
            );
        }
    }

    if !doc.examples.is_empty() {
        println!();
        println!("Examples:");
        for example in &doc.examples {
            println!();
            for line in example.lines() {
                println!("  {line}");
            }
        }
    }
}
