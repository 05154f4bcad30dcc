/// Toolchains - How a Language Is Built and Run
///
/// **Responsibility:**
/// Turn a language profile into concrete command lines for one job's
/// work directory.
///
/// The engine only ever talks to `dyn Toolchain`; it never branches on a
/// language name. Profiles from `languages.json` are wrapped by
/// [`ConfiguredToolchain`], and anything else (tests, special runtimes)
/// can implement the trait directly and be registered by hand.

use codegrade_common::config::{CommandTemplate, LanguageConfig, LanguageConfigManager};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    /// Space-joined command line, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Locations inside one job's private work directory.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    pub workdir: PathBuf,
    pub source: PathBuf,
}

impl BuildPaths {
    pub fn new(workdir: &Path, source_file_name: &str) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            source: workdir.join(source_file_name),
        }
    }

    /// Source file name without its extension.
    pub fn source_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub trait Toolchain: Send + Sync {
    fn language(&self) -> &str;

    /// File name the source text is written to inside the work directory.
    fn source_file_name(&self) -> String;

    /// `None` for interpreted languages.
    fn compile_command(&self, paths: &BuildPaths) -> Option<CommandSpec>;

    /// Extension of the artifacts that name the entry point, when the run
    /// command depends on what compilation produced.
    fn entry_artifact_extension(&self) -> Option<&str> {
        None
    }

    fn run_command(&self, paths: &BuildPaths, entry: Option<&str>) -> CommandSpec;
}

/// Toolchain described by a `languages.json` entry.
#[derive(Debug, Clone)]
pub struct ConfiguredToolchain {
    config: LanguageConfig,
}

impl ConfiguredToolchain {
    pub fn new(config: LanguageConfig) -> Self {
        Self { config }
    }
}

impl Toolchain for ConfiguredToolchain {
    fn language(&self) -> &str {
        &self.config.name
    }

    fn source_file_name(&self) -> String {
        self.config.source_file_name()
    }

    fn compile_command(&self, paths: &BuildPaths) -> Option<CommandSpec> {
        self.config
            .compile
            .as_ref()
            .map(|template| render(template, paths, None))
    }

    fn entry_artifact_extension(&self) -> Option<&str> {
        self.config
            .entry_point
            .as_ref()
            .map(|rule| rule.artifact_extension.trim_start_matches('.'))
    }

    fn run_command(&self, paths: &BuildPaths, entry: Option<&str>) -> CommandSpec {
        render(&self.config.run, paths, entry)
    }
}

fn render(template: &CommandTemplate, paths: &BuildPaths, entry: Option<&str>) -> CommandSpec {
    let source = paths.source.to_string_lossy();
    let workdir = paths.workdir.to_string_lossy();
    let entry = entry.unwrap_or_default();

    let fill = |part: &str| {
        part.replace("{source}", &source)
            .replace("{workdir}", &workdir)
            .replace("{entry}", entry)
    };

    CommandSpec {
        program: fill(&template.command),
        args: template.args.iter().map(|arg| fill(arg)).collect(),
        cwd: paths.workdir.clone(),
    }
}

/// Language name → toolchain.
#[derive(Clone, Default)]
pub struct ToolchainRegistry {
    toolchains: BTreeMap<String, Arc<dyn Toolchain>>,
}

impl ToolchainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(manager: &LanguageConfigManager) -> Self {
        let mut registry = Self::new();
        for config in manager.configs() {
            registry.register(Arc::new(ConfiguredToolchain::new(config.clone())));
        }
        registry
    }

    /// Add or replace the toolchain for its language.
    pub fn register(&mut self, toolchain: Arc<dyn Toolchain>) {
        self.toolchains
            .insert(toolchain.language().to_string(), toolchain);
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn Toolchain>> {
        self.toolchains.get(language).cloned()
    }

    pub fn languages(&self) -> Vec<String> {
        self.toolchains.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.toolchains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegrade_common::config::EntryPointRule;

    fn java() -> LanguageConfig {
        LanguageConfig {
            name: "java".into(),
            version: "17".into(),
            file_extension: ".java".into(),
            source_file: Some("Main.java".into()),
            compile: Some(CommandTemplate {
                command: "javac".into(),
                args: vec!["-d".into(), "{workdir}".into(), "{source}".into()],
            }),
            run: CommandTemplate {
                command: "java".into(),
                args: vec!["-cp".into(), "{workdir}".into(), "{entry}".into()],
            },
            entry_point: Some(EntryPointRule {
                artifact_extension: ".class".into(),
            }),
        }
    }

    #[test]
    fn test_placeholders_are_filled() {
        let toolchain = ConfiguredToolchain::new(java());
        let paths = BuildPaths::new(Path::new("/tmp/job"), &toolchain.source_file_name());

        let compile = toolchain.compile_command(&paths).unwrap();
        assert_eq!(compile.program, "javac");
        assert_eq!(compile.args, vec!["-d", "/tmp/job", "/tmp/job/Main.java"]);
        assert_eq!(compile.cwd, PathBuf::from("/tmp/job"));

        let run = toolchain.run_command(&paths, Some("Solution"));
        assert_eq!(run.display(), "java -cp /tmp/job Solution");
        assert_eq!(toolchain.entry_artifact_extension(), Some("class"));
        assert_eq!(paths.source_stem(), "Main");
    }

    #[test]
    fn test_interpreted_has_no_compile_step() {
        let mut python = java();
        python.name = "python".into();
        python.source_file = None;
        python.file_extension = "py".into();
        python.compile = None;
        python.entry_point = None;

        let toolchain = ConfiguredToolchain::new(python);
        let paths = BuildPaths::new(Path::new("/w"), &toolchain.source_file_name());
        assert!(toolchain.compile_command(&paths).is_none());
        assert_eq!(paths.source, PathBuf::from("/w/main.py"));
    }

    #[test]
    fn test_registry_lookup() {
        let manager = LanguageConfigManager::from_configs(vec![java()]).unwrap();
        let registry = ToolchainRegistry::from_config(&manager);
        assert_eq!(registry.languages(), vec!["java"]);
        assert!(registry.get("java").is_some());
        assert!(registry.get("cobol").is_none());
        assert!(!registry.is_empty());
        assert!(ToolchainRegistry::new().is_empty());
    }
}
