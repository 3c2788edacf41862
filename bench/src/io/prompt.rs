//! Prompt template loading and `{{TOKEN}}` substitution.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::core::types::MatrixItem;

/// Values substituted into a prompt template for one matrix item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptVars {
    pub game_key: String,
    pub game_name: String,
    pub model_provider: String,
    pub model_key: String,
    pub model_id: String,
    pub output_dir: String,
}

impl PromptVars {
    pub fn for_item(item: &MatrixItem, output_dir: &Path) -> Self {
        Self {
            game_key: item.game.key.clone(),
            game_name: item.game.name.clone(),
            model_provider: item.provider_id.clone(),
            model_key: item.model.key.clone(),
            model_id: item.model.id.clone(),
            output_dir: output_dir.display().to_string(),
        }
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        match token {
            "GAME_KEY" => Some(&self.game_key),
            "GAME_NAME" => Some(&self.game_name),
            "MODEL_PROVIDER" => Some(&self.model_provider),
            "MODEL_KEY" => Some(&self.model_key),
            "MODEL_ID" => Some(&self.model_id),
            "OUTPUT_DIR" => Some(&self.output_dir),
            _ => None,
        }
    }
}

/// Read a prompt template from disk.
pub fn load_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read prompt template {}", path.display()))
}

/// Replace recognized `{{TOKEN}}` placeholders in a single pass.
///
/// Unrecognized tokens are left untouched, and substituted values are never
/// re-scanned.
pub fn render_prompt(template: &str, vars: &PromptVars) -> String {
    use std::sync::LazyLock;
    static TOKEN_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"\{\{([A-Z0-9_]+)\}\}").unwrap());

    TOKEN_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.lookup(&caps[1]).unwrap_or(&caps[0]).to_string()
        })
        .into_owned()
}

/// Hex SHA-256 of a rendered prompt, recorded for reproducibility.
pub fn prompt_sha256(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> PromptVars {
        PromptVars {
            game_key: "pong".to_string(),
            game_name: "Pong".to_string(),
            model_provider: "codex".to_string(),
            model_key: "gpt-5".to_string(),
            model_id: "gpt-5-codex".to_string(),
            output_dir: "/tmp/out/codex--gpt-5--pong".to_string(),
        }
    }

    #[test]
    fn substitutes_known_tokens() {
        let rendered = render_prompt(
            "Build {{GAME_NAME}} ({{GAME_KEY}}) with {{MODEL_PROVIDER}}/{{MODEL_KEY}} [{{MODEL_ID}}] in {{OUTPUT_DIR}}.",
            &vars(),
        );
        assert_eq!(
            rendered,
            "Build Pong (pong) with codex/gpt-5 [gpt-5-codex] in /tmp/out/codex--gpt-5--pong."
        );
    }

    #[test]
    fn leaves_unknown_tokens_untouched() {
        let rendered = render_prompt("{{UNKNOWN}} {{ GAME_KEY }} {{GAME_KEY}}", &vars());
        assert_eq!(rendered, "{{UNKNOWN}} {{ GAME_KEY }} pong");
    }

    #[test]
    fn does_not_rescan_substituted_values() {
        let mut vars = vars();
        vars.game_name = "{{GAME_KEY}}".to_string();
        assert_eq!(render_prompt("{{GAME_NAME}}", &vars), "{{GAME_KEY}}");
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = prompt_sha256("hello");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, prompt_sha256("hello"));
        assert_ne!(digest, prompt_sha256("hello!"));
    }
}
