// CLI commands for running jobs and managing language profiles
use anyhow::{bail, Context, Result};
use codegrade_common::config::{
    load_languages_json, save_languages_json, CommandTemplate, EntryPointRule, LanguageConfig,
    LanguageConfigManager,
};
use codegrade_common::request;
use codegrade_common::response;
use codegrade_common::settings::Settings;
use codegrade_common::types::{ExecutionResult, JobRequest};
use codegrade_engine::{ExecutionEngine, ToolchainRegistry};
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Profiles written by `init`.
pub const DEFAULT_LANGUAGES_JSON: &str = include_str!("../../../config/languages.json");

pub fn settings_for(config: Option<PathBuf>) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(path) = config {
        settings.languages_path = path;
    }
    settings
}

fn build_engine(settings: &Settings) -> Result<ExecutionEngine> {
    let manager = LanguageConfigManager::load(&settings.languages_path).with_context(|| {
        format!(
            "Failed to load language configuration from {} (try `codegrade-cli init`)",
            settings.languages_path.display()
        )
    })?;
    let registry = ToolchainRegistry::from_config(&manager);
    if registry.is_empty() {
        bail!(
            "No languages configured in {}",
            settings.languages_path.display()
        );
    }
    Ok(ExecutionEngine::new(registry, settings.clone()))
}

fn print_result(result: &ExecutionResult, pretty: bool) {
    if pretty {
        println!("{}", response::encode_pretty(result));
    } else {
        println!("{}", response::encode(result));
    }
}

/// Run a raw request document. Returns whether the job passed.
pub async fn exec_request(settings: &Settings, request_path: &str, pretty: bool) -> Result<bool> {
    let text = if request_path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        fs::read_to_string(request_path)
            .with_context(|| format!("Failed to read request file {}", request_path))?
    };

    let result = match request::decode(&text) {
        Ok(job_request) => build_engine(settings)?.execute(job_request).await,
        Err(e) => ExecutionResult::failure(e.to_string()),
    };

    print_result(&result, pretty);
    Ok(result.passed())
}

/// Run a source file with cases read from a JSON file. Returns whether the job passed.
pub async fn run_source(
    settings: &Settings,
    language: &str,
    source_path: &Path,
    timeout_secs: Option<u64>,
    cases_path: Option<&Path>,
    pretty: bool,
) -> Result<bool> {
    let result = execute_source(settings, language, source_path, timeout_secs, cases_path).await?;
    print_result(&result, pretty);
    Ok(result.passed())
}

async fn execute_source(
    settings: &Settings,
    language: &str,
    source_path: &Path,
    timeout_secs: Option<u64>,
    cases_path: Option<&Path>,
) -> Result<ExecutionResult> {
    let source = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read source file {}", source_path.display()))?;

    let cases = match cases_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read cases file {}", path.display()))?;
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse cases file {}", path.display()))?;
            Some(value)
        }
        None => None,
    };

    let job_request = JobRequest {
        language: Some(language.to_string()),
        source: Some(source),
        timeout: timeout_secs.map(Value::from),
        cases,
    };

    let engine = build_engine(settings)?;
    info!(language, source = %source_path.display(), "Running source file");
    Ok(engine.execute(job_request).await)
}

/// List configured languages
pub fn list_languages(config_path: &Path) -> Result<()> {
    let manager = LanguageConfigManager::load(config_path)?;
    let configs: Vec<&LanguageConfig> = manager.configs().collect();

    if configs.is_empty() {
        println!("No languages configured.");
        println!("\nAdd a language with: codegrade-cli add-lang --name <name> --ext <ext> --run <command>");
        return Ok(());
    }

    println!("Configured Languages:\n");
    println!(
        "{:<12} {:<10} {:<8} {:<10} {:<40}",
        "NAME", "VERSION", "EXT", "COMPILED", "RUN"
    );
    println!("{}", "-".repeat(84));

    for lang in &configs {
        println!(
            "{:<12} {:<10} {:<8} {:<10} {:<40}",
            lang.name,
            lang.version,
            lang.file_extension,
            if lang.compile.is_some() { "yes" } else { "no" },
            command_line(&lang.run)
        );
    }

    println!("\nTotal: {} language(s)", configs.len());
    Ok(())
}

fn command_line(template: &CommandTemplate) -> String {
    std::iter::once(template.command.as_str())
        .chain(template.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a whitespace separated command line into a template.
fn parse_command_line(line: &str) -> Result<CommandTemplate> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let Some(command) = parts.next() else {
        bail!("Command cannot be empty");
    };
    Ok(CommandTemplate {
        command,
        args: parts.collect(),
    })
}

pub struct NewLanguage<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub version: &'a str,
    pub run: &'a str,
    pub compile: Option<&'a str>,
    pub source_file: Option<&'a str>,
    pub entry_ext: Option<&'a str>,
}

/// Add a new language profile
pub fn add_language(config_path: &Path, new: NewLanguage<'_>) -> Result<()> {
    if new.name.trim().is_empty() || new.ext.trim().is_empty() {
        bail!("Language name and extension cannot be empty");
    }

    let mut languages_json = load_languages_json(config_path)?;

    if languages_json.languages.iter().any(|l| l.name == new.name) {
        bail!("Language '{}' already exists in config", new.name);
    }

    let file_extension = if new.ext.starts_with('.') {
        new.ext.to_string()
    } else {
        format!(".{}", new.ext)
    };

    let lang = LanguageConfig {
        name: new.name.to_string(),
        version: new.version.to_string(),
        file_extension,
        source_file: new.source_file.map(str::to_string),
        compile: new.compile.map(parse_command_line).transpose()?,
        run: parse_command_line(new.run)?,
        entry_point: new.entry_ext.map(|ext| EntryPointRule {
            artifact_extension: if ext.starts_with('.') {
                ext.to_string()
            } else {
                format!(".{}", ext)
            },
        }),
    };

    languages_json.languages.push(lang);

    // refuse to write a file the engine would reject
    LanguageConfigManager::from_configs(languages_json.languages.clone())?;

    save_languages_json(config_path, &languages_json)?;
    println!("Language '{}' added to {}", new.name, config_path.display());
    Ok(())
}

/// Write the default profiles
pub fn init_config(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    fs::write(config_path, DEFAULT_LANGUAGES_JSON)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Wrote default language profiles to {}", config_path.display());
    Ok(())
}
