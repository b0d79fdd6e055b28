use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::execution::ExecutionPhase;

/// Immutable description of one benchmark test.
///
/// Script templates are keyed by `<phase>` or `<phase>_<platform-prefix>`
/// (e.g. `install`, `install_ubuntu`, `install_ubuntu_16_04`); free-form
/// properties carry tool name, workload name, categories and description.
/// Loaded once by the configuration layer and shared read-only across all
/// executions of the same test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkTestDefinition {
    templates: HashMap<String, String>,
    properties: HashMap<String, String>,
    parser: Option<String>,
}

impl BenchmarkTestDefinition {
    pub fn new(
        templates: HashMap<String, String>,
        properties: HashMap<String, String>,
        parser: Option<String>,
    ) -> Self {
        Self {
            templates,
            properties,
            parser,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Registry id of the result parser recorded for this test, if any.
    pub fn parser(&self) -> Option<&str> {
        self.parser.as_deref()
    }

    /// Resolve, interpolate and dedent the script for `phase` on `platform`.
    ///
    /// Resolution tries the full platform string first, then progressively
    /// shorter underscore-joined prefixes, then the phase name alone. The
    /// first template found wins; `None` means no entry matches at any level.
    pub fn script(
        &self,
        phase: ExecutionPhase,
        platform: &str,
        vars: &HashMap<String, String>,
    ) -> Option<String> {
        self.resolve_template(phase.as_str(), platform)
            .map(|template| dedent(&interpolate(template, vars)).trim().to_string())
    }

    pub fn install_script(&self, platform: &str, vars: &HashMap<String, String>) -> Option<String> {
        self.script(ExecutionPhase::Install, platform, vars)
    }

    pub fn postinstall_script(
        &self,
        platform: &str,
        vars: &HashMap<String, String>,
    ) -> Option<String> {
        self.script(ExecutionPhase::PostInstall, platform, vars)
    }

    pub fn execute_script(&self, platform: &str, vars: &HashMap<String, String>) -> Option<String> {
        self.script(ExecutionPhase::Run, platform, vars)
    }

    pub fn remove_script(&self, platform: &str, vars: &HashMap<String, String>) -> Option<String> {
        self.script(ExecutionPhase::Cleanup, platform, vars)
    }

    fn resolve_template(&self, phase: &str, platform: &str) -> Option<&str> {
        let mut tokens: Vec<&str> = platform.split('_').filter(|t| !t.is_empty()).collect();
        while !tokens.is_empty() {
            let key = format!("{}_{}", phase, tokens.join("_"));
            if let Some(template) = self.templates.get(&key) {
                return Some(template);
            }
            tokens.pop();
        }
        self.templates.get(phase).map(String::as_str)
    }
}

/// Replace every `$$name$$` placeholder from `vars`; unmatched placeholders
/// are left verbatim.
fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    let placeholder = Regex::new(r"\$\$([A-Za-z0-9_.-]+)\$\$").expect("placeholder pattern");
    placeholder
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Strip the leading whitespace common to all non-blank lines, so templates
/// indented inside a configuration file run as written.
fn dedent(text: &str) -> String {
    let prefix = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .fold(None::<&str>, |common, indent| match common {
            None => Some(indent),
            Some(common) => {
                let shared = common
                    .bytes()
                    .zip(indent.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                Some(&common[..shared])
            }
        })
        .unwrap_or("");

    if prefix.is_empty() {
        return text.to_string();
    }

    text.lines()
        .map(|line| line.strip_prefix(prefix).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(templates: &[(&str, &str)]) -> BenchmarkTestDefinition {
        let templates = templates
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BenchmarkTestDefinition::new(templates, HashMap::new(), None)
    }

    #[test]
    fn test_resolution_prefers_full_platform() {
        let def = definition(&[
            ("install_ubuntu_16_04", "full"),
            ("install_ubuntu", "prefix"),
            ("install", "bare"),
        ]);
        assert_eq!(
            def.script(ExecutionPhase::Install, "ubuntu_16_04", &HashMap::new()),
            Some("full".to_string())
        );
    }

    #[test]
    fn test_resolution_falls_back_through_prefixes() {
        // neither install_ubuntu_16_04 nor install_ubuntu_16 exist
        let def = definition(&[("install_ubuntu", "apt-get update")]);
        assert_eq!(
            def.script(ExecutionPhase::Install, "ubuntu_16_04", &HashMap::new()),
            Some("apt-get update".to_string())
        );
    }

    #[test]
    fn test_resolution_falls_back_to_bare_phase() {
        let def = definition(&[("run", "./bench.sh")]);
        assert_eq!(
            def.script(ExecutionPhase::Run, "centos_7", &HashMap::new()),
            Some("./bench.sh".to_string())
        );
    }

    #[test]
    fn test_resolution_none_when_nothing_matches() {
        let def = definition(&[("install_debian", "x")]);
        assert_eq!(
            def.script(ExecutionPhase::Install, "ubuntu_16_04", &HashMap::new()),
            None
        );
    }

    #[test]
    fn test_named_accessors_resolve_their_phase() {
        let def = definition(&[
            ("install", "i"),
            ("postinstall", "p"),
            ("run", "r"),
            ("cleanup", "c"),
        ]);
        let vars = HashMap::new();
        assert_eq!(def.install_script("ubuntu", &vars), Some("i".to_string()));
        assert_eq!(def.postinstall_script("ubuntu", &vars), Some("p".to_string()));
        assert_eq!(def.execute_script("ubuntu", &vars), Some("r".to_string()));
        assert_eq!(def.remove_script("ubuntu", &vars), Some("c".to_string()));
    }

    #[test]
    fn test_interpolation_replaces_known_placeholders() {
        let vars = HashMap::from([("msg".to_string(), "hi".to_string())]);
        assert_eq!(interpolate("echo $$msg$$", &vars), "echo hi");
    }

    #[test]
    fn test_interpolation_keeps_unmatched_placeholders() {
        let vars = HashMap::from([("msg".to_string(), "hi".to_string())]);
        assert_eq!(
            interpolate("echo $$msg$$ $$other$$", &vars),
            "echo hi $$other$$"
        );
    }

    #[test]
    fn test_dedent_strips_common_indentation() {
        let text = "    line one\n      line two\n    line three";
        assert_eq!(dedent(text), "line one\n  line two\nline three");
    }

    #[test]
    fn test_dedent_ignores_blank_lines() {
        let text = "    first\n\n    second";
        assert_eq!(dedent(text), "first\n\nsecond");
    }

    #[test]
    fn test_script_is_dedented_and_trimmed() {
        let def = definition(&[("run", "\n    ./run.sh --fast\n    ./collect.sh\n")]);
        assert_eq!(
            def.script(ExecutionPhase::Run, "any", &HashMap::new()),
            Some("./run.sh --fast\n./collect.sh".to_string())
        );
    }
}
