//! Configuration file loading.
//!
//! ```toml
//! [variable.db_password]
//! default = "postgres"
//!
//! [locals]
//! host = "${env.PGHOST:-localhost}"
//!
//! [env.local]
//! db_url = "postgres://postgres:${var.db_password}@${local.host}:5432/app"
//! migration_dir = "./migrations"
//! schema_files = ["schema/app.sql"]
//!
//! [env.local.github]
//! owner = "acme"
//! repo = "app"
//! target_branch = "main"
//! ```
//!
//! String values may reference `${var.NAME}`, `${local.NAME}`, `${env.NAME}`
//! and `${env.NAME:-fallback}`. `$${` produces a literal `${`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{MigrantError, Result};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./pgmigrant.toml";

const DEFAULT_MIGRATION_DIR: &str = "./migrations";

/// Repository the `check` and `repo-last-migration` commands compare against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub target_branch: Option<String>,
}

/// The selected environment, fully interpolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub env_name: String,
    pub db_url: String,
    pub migration_dir: PathBuf,
    pub schema_files: Vec<PathBuf>,
    pub exclude_schemas: Vec<String>,
    pub allow_db_clean: bool,
    pub diff_command: Vec<String>,
    pub github: Option<GitHubConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    variable: BTreeMap<String, VariableDecl>,
    #[serde(default)]
    locals: BTreeMap<String, String>,
    #[serde(default)]
    env: BTreeMap<String, RawEnv>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariableDecl {
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnv {
    db_url: String,
    migration_dir: Option<String>,
    #[serde(default)]
    schema_files: Vec<String>,
    #[serde(default)]
    exclude_schemas: Vec<String>,
    #[serde(default)]
    allow_db_clean: bool,
    #[serde(default)]
    diff_command: Vec<String>,
    github: Option<GitHubConfig>,
}

impl Config {
    /// Load `path`, select `env` and apply `--var` overrides, reading
    /// `${env.*}` references from the process environment.
    pub fn load(path: &Path, env: Option<&str>, vars: &[(String, String)]) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MigrantError::io(path, e))?;
        Self::parse(&text, env, vars, |name| std::env::var(name).ok())
    }

    /// Parse configuration text. `lookup_env` resolves `${env.NAME}`.
    pub fn parse<F>(
        text: &str,
        env: Option<&str>,
        vars: &[(String, String)],
        lookup_env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|e| MigrantError::Config(format!("parse error: {}", e)))?;

        let mut scope = Scope {
            vars: BTreeMap::new(),
            locals: BTreeMap::new(),
            lookup_env: &lookup_env,
        };

        for (name, decl) in &raw.variable {
            if let Some(default) = &decl.default {
                let value = scope.interpolate(default)?;
                scope.vars.insert(name.clone(), value);
            }
        }
        for (name, value) in vars {
            if raw.variable.contains_key(name) {
                scope.vars.insert(name.clone(), value.clone());
            } else {
                warn!(variable = %name, "--var given for an undeclared variable, ignoring");
            }
        }
        for (name, value) in &raw.locals {
            let value = scope.interpolate(value)?;
            scope.locals.insert(name.clone(), value);
        }

        let (env_name, raw_env) = select_env(raw.env, env)?;

        let github = match raw_env.github {
            Some(gh) => Some(GitHubConfig {
                owner: scope.interpolate(&gh.owner)?,
                repo: scope.interpolate(&gh.repo)?,
                target_branch: gh
                    .target_branch
                    .map(|b| scope.interpolate(&b))
                    .transpose()?,
            }),
            None => None,
        };

        Ok(Config {
            db_url: scope.interpolate(&raw_env.db_url)?,
            migration_dir: PathBuf::from(scope.interpolate(
                raw_env
                    .migration_dir
                    .as_deref()
                    .unwrap_or(DEFAULT_MIGRATION_DIR),
            )?),
            schema_files: raw_env
                .schema_files
                .iter()
                .map(|f| scope.interpolate(f).map(PathBuf::from))
                .collect::<Result<_>>()?,
            exclude_schemas: scope.interpolate_all(&raw_env.exclude_schemas)?,
            allow_db_clean: raw_env.allow_db_clean,
            diff_command: scope.interpolate_all(&raw_env.diff_command)?,
            github,
            env_name,
        })
    }
}

fn select_env(
    mut envs: BTreeMap<String, RawEnv>,
    wanted: Option<&str>,
) -> Result<(String, RawEnv)> {
    match wanted {
        Some(name) => envs.remove_entry(name).ok_or_else(|| {
            MigrantError::Config(format!("environment {:?} not found in config", name))
        }),
        None if envs.len() <= 1 => envs
            .pop_first()
            .ok_or_else(|| MigrantError::Config("no environments declared".to_string())),
        None => Err(MigrantError::Config(format!(
            "several environments declared ({}), select one with --env",
            envs.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

struct Scope<'a> {
    vars: BTreeMap<String, String>,
    locals: BTreeMap<String, String>,
    lookup_env: &'a dyn Fn(&str) -> Option<String>,
}

impl Scope<'_> {
    fn interpolate_all(&self, values: &[String]) -> Result<Vec<String>> {
        values.iter().map(|v| self.interpolate(v)).collect()
    }

    fn interpolate(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            if rest[..start].ends_with('$') {
                out.push_str(&rest[..start - 1]);
                out.push_str("${");
                rest = &rest[start + 2..];
                continue;
            }
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                MigrantError::Config(format!("unterminated reference in {:?}", input))
            })?;
            out.push_str(&self.resolve(after[..end].trim())?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve(&self, reference: &str) -> Result<String> {
        let (namespace, name) = reference
            .split_once('.')
            .ok_or_else(|| MigrantError::Config(format!("invalid reference ${{{}}}", reference)))?;

        match namespace {
            "var" => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| MigrantError::Config(format!("undefined variable {:?}", name))),
            "local" => self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| MigrantError::Config(format!("undefined local {:?}", name))),
            "env" => {
                let (key, fallback) = match name.split_once(":-") {
                    Some((key, fallback)) => (key, Some(fallback)),
                    None => (name, None),
                };
                Ok((self.lookup_env)(key)
                    .filter(|v| !v.is_empty())
                    .or_else(|| fallback.map(String::from))
                    .unwrap_or_default())
            }
            other => Err(MigrantError::Config(format!(
                "unknown namespace {:?} in ${{{}}}",
                other, reference
            ))),
        }
    }
}

/// Parse a `--var KEY=VALUE` argument.
pub fn parse_var(arg: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("invalid variable format, expected key=value, got {}", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty key is not allowed".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}
