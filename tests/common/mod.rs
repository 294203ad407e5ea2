//! In-memory stand-ins shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use pgmigrant::applier::{Applier, split_statements};
use pgmigrant::confirm::Confirm;
use pgmigrant::store::VersionStore;
use pgmigrant::{MigrantError, Result, Version};

/// Tracks the version marker and executed statements. A statement containing
/// `FAIL` errors, discarding the whole migration.
#[derive(Default)]
pub struct FakeDb {
    pub tracking: bool,
    pub current: Option<Version>,
    pub executed: Vec<String>,
    pub tracking_created: usize,
}

impl FakeDb {
    pub fn tracked_at(version: Option<&str>) -> Self {
        Self {
            tracking: true,
            current: version.map(|v| v.parse().unwrap()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VersionStore for FakeDb {
    async fn ensure_tracking_exists(&mut self) -> Result<()> {
        self.tracking = true;
        self.tracking_created += 1;
        Ok(())
    }

    async fn read_current_version(&mut self) -> Result<Option<Version>> {
        if !self.tracking {
            return Err(MigrantError::TrackingAbsent);
        }
        Ok(self.current.clone())
    }

    async fn drop_tracking(&mut self) -> Result<()> {
        self.tracking = false;
        self.current = None;
        Ok(())
    }
}

#[async_trait]
impl Applier for FakeDb {
    async fn apply(&mut self, version: &Version, sql: &str) -> Result<Duration> {
        let mut staged = Vec::new();
        for fragment in split_statements(sql) {
            if fragment.contains("FAIL") {
                return Err(MigrantError::storage(
                    format!("migration {} failed", version),
                    sqlx::Error::Protocol("syntax error".to_string()),
                ));
            }
            staged.push(fragment.trim().to_string());
        }
        self.executed.extend(staged);
        self.current = Some(version.clone());
        Ok(Duration::from_millis(1))
    }
}

pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

pub fn migrations(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn versions(list: &[Version]) -> Vec<&str> {
    list.iter().map(|v| v.as_str()).collect()
}
