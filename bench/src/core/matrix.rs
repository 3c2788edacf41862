//! Matrix resolution: filtered, deterministically ordered games × providers × models.

use anyhow::{Result, bail};

use crate::core::types::{GameSpec, MatrixItem, ProviderSpec};

/// A `--models` entry: `modelKey` or `providerId:modelKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFilter {
    pub provider: Option<String>,
    pub key: String,
}

impl ModelFilter {
    fn matches(&self, provider_id: &str, model_key: &str) -> bool {
        let provider_ok = self
            .provider
            .as_deref()
            .is_none_or(|p| p.eq_ignore_ascii_case(provider_id));
        provider_ok && self.key.eq_ignore_ascii_case(model_key)
    }
}

/// Case-insensitive selection filters. Empty lists select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixFilters {
    pub games: Vec<String>,
    pub agents: Vec<String>,
    pub models: Vec<ModelFilter>,
}

impl MatrixFilters {
    /// Parse comma-separated CLI values. Blank entries are ignored.
    pub fn parse(games: Option<&str>, agents: Option<&str>, models: Option<&str>) -> Result<Self> {
        let models = split_csv(models)
            .into_iter()
            .map(|entry| parse_model_filter(&entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            games: split_csv(games),
            agents: split_csv(agents),
            models,
        })
    }

    fn game_selected(&self, key: &str) -> bool {
        self.games.is_empty() || self.games.iter().any(|g| g.eq_ignore_ascii_case(key))
    }

    fn agent_selected(&self, id: &str) -> bool {
        self.agents.is_empty() || self.agents.iter().any(|a| a.eq_ignore_ascii_case(id))
    }

    fn model_selected(&self, provider_id: &str, model_key: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m.matches(provider_id, model_key))
    }

    /// Filter entries that match nothing in the catalog (likely typos).
    pub fn unmatched(&self, games: &[GameSpec], providers: &[ProviderSpec]) -> Vec<String> {
        let mut unmatched = Vec::new();
        for entry in &self.games {
            if !games.iter().any(|g| g.key.eq_ignore_ascii_case(entry)) {
                unmatched.push(format!("--games {entry}"));
            }
        }
        for entry in &self.agents {
            if !providers.iter().any(|p| p.id.eq_ignore_ascii_case(entry)) {
                unmatched.push(format!("--agents {entry}"));
            }
        }
        for entry in &self.models {
            let found = providers
                .iter()
                .any(|p| p.models.iter().any(|m| entry.matches(&p.id, &m.key)));
            if !found {
                match &entry.provider {
                    Some(provider) => unmatched.push(format!("--models {provider}:{}", entry.key)),
                    None => unmatched.push(format!("--models {}", entry.key)),
                }
            }
        }
        unmatched
    }
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_model_filter(entry: &str) -> Result<ModelFilter> {
    let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
    match parts.as_slice() {
        [key] => Ok(ModelFilter {
            provider: None,
            key: (*key).to_string(),
        }),
        [provider, key] if !provider.is_empty() && !key.is_empty() => Ok(ModelFilter {
            provider: Some((*provider).to_string()),
            key: (*key).to_string(),
        }),
        _ => bail!("invalid --models entry {entry:?}: expected modelKey or providerId:modelKey"),
    }
}

/// Resolve the ordered matrix.
///
/// Games are ordered by release year ascending; ties keep declaration order.
/// Within a game, providers and models keep declaration order. An empty
/// selection at any stage is an error.
pub fn resolve_matrix(
    games: &[GameSpec],
    providers: &[ProviderSpec],
    filters: &MatrixFilters,
) -> Result<Vec<MatrixItem>> {
    let mut selected_games: Vec<&GameSpec> = games
        .iter()
        .filter(|game| filters.game_selected(&game.key))
        .collect();
    if selected_games.is_empty() {
        bail!("no games selected (--games {})", filters.games.join(","));
    }
    selected_games.sort_by_key(|game| game.release_year);

    let selected_providers: Vec<&ProviderSpec> = providers
        .iter()
        .filter(|provider| filters.agent_selected(&provider.id))
        .collect();
    if selected_providers.is_empty() {
        bail!("no providers selected (--agents {})", filters.agents.join(","));
    }

    let mut items = Vec::new();
    for game in &selected_games {
        for provider in &selected_providers {
            for model in provider
                .models
                .iter()
                .filter(|model| filters.model_selected(&provider.id, &model.key))
            {
                items.push(MatrixItem {
                    game: (*game).clone(),
                    provider_id: provider.id.clone(),
                    binary: provider.binary.clone(),
                    model: model.clone(),
                });
            }
        }
    }
    if items.is_empty() {
        bail!("matrix is empty after applying filters (no selected provider offers a selected model)");
    }
    Ok(items)
}
