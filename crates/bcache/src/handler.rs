//! Subcommand execution against an open cache

use anyhow::{Context, Result};
use boundcache::Cache;
use clap::Subcommand;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store VALUE under KEY
    Put { key: String, value: String },
    /// Print the value stored under KEY
    Get { key: String },
    /// Print whether KEY is cached
    Has { key: String },
    /// Delete KEY
    Remove { key: String },
    /// Delete every entry
    Clear,
    /// Print the number of entries
    Count,
    /// List keys, least recently written first
    Keys,
}

pub struct CommandHandler<'a, C> {
    cache: &'a C,
}

impl<'a, C> CommandHandler<'a, C>
where
    C: Cache<Value = String>,
{
    pub fn new(cache: &'a C) -> Self {
        Self { cache }
    }

    /// Run `command`, returning what should be printed
    pub fn handle(&self, command: &Command) -> Result<String> {
        match command {
            Command::Put { key, value } => {
                self.cache
                    .put(key, value.clone())
                    .with_context(|| format!("Failed to store '{}'", key))?;
                Ok(String::new())
            }
            Command::Get { key } => {
                let value = self
                    .cache
                    .get(key)
                    .with_context(|| format!("Failed to read '{}'", key))?;
                Ok(value.unwrap_or_else(|| "(nil)".to_string()))
            }
            Command::Has { key } => Ok(self.cache.has(key).to_string()),
            Command::Remove { key } => {
                self.cache
                    .remove(key)
                    .with_context(|| format!("Failed to remove '{}'", key))?;
                Ok(String::new())
            }
            Command::Clear => {
                self.cache.remove_all().context("Failed to clear cache")?;
                Ok(String::new())
            }
            Command::Count => Ok(self.cache.count().to_string()),
            Command::Keys => Ok(self.cache.keys().join("\n")),
        }
    }
}
