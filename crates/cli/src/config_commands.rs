use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    ocean_config::{
        Diagnostic, PluginConfig, Severity, ValidationResult, env_subst::substitute_env,
        validate_config, validate_toml_str,
    },
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => show(path),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(ocean_config::find_config_file);
    let result = match path {
        Some(ref path) => {
            eprintln!("Checking {}\n", path.display());
            validate_file(path)
        },
        None => {
            eprintln!("No config file found; checking defaults.\n");
            validate_config(&PluginConfig::default())
        },
    };

    for d in &result.diagnostics {
        eprintln!("  {}", render(d));
    }
    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// TOML files get the key-level checks as well; other formats are parsed
/// and validated semantically.
fn validate_file(path: &Path) -> ValidationResult {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => substitute_env(&raw),
        Err(e) => return single_error(format!("cannot read file: {e}")),
    };
    if path.extension().is_none_or(|ext| ext == "toml") {
        return validate_toml_str(&raw);
    }
    match ocean_config::load_config(path) {
        Ok(config) => validate_config(&config),
        Err(e) => single_error(e.to_string()),
    }
}

fn single_error(message: String) -> ValidationResult {
    ValidationResult {
        diagnostics: vec![Diagnostic {
            severity: Severity::Error,
            path: String::new(),
            message,
        }],
    }
}

fn render(d: &Diagnostic) -> String {
    let (color, label) = match d.severity {
        Severity::Error => (RED, "error"),
        Severity::Warning => (YELLOW, "warning"),
    };
    if d.path.is_empty() {
        format!("{BOLD}{color}{label}{RESET} {}", d.message)
    } else {
        format!("{BOLD}{color}{label}{RESET} {}: {}", d.path, d.message)
    }
}

fn show(path: Option<&Path>) -> Result<()> {
    let config = crate::load_config(path.map(Path::to_path_buf).as_ref())?;
    print!("{}", ocean_config::to_toml_string(&config)?);
    Ok(())
}
