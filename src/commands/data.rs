use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

use super::OutputFormat;
use staybook::engine::seed;
use staybook::models::IndexField;
use staybook::{Collection, SaveOutcome, SyncEngine};

/// List the records of a collection
#[derive(Args)]
pub struct ListCommand {
    /// Collection key (rooms, guests, staff, ...)
    collection: Collection,

    /// Only records with this status
    #[arg(long, conflicts_with_all = ["category", "date"])]
    status: Option<String>,

    /// Only records in this category
    #[arg(long, conflicts_with = "date")]
    category: Option<String>,

    /// Only records on this day (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl ListCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let collection = self.collection;
        let items = engine
            .load_values(collection, seed::values_for(collection))
            .await?;

        let items = match self.filter() {
            Some((field, value)) => {
                let source = collection.index_source(field).ok_or_else(|| {
                    format!("{} has no {:?} index", collection, field)
                })?;
                if engine.settings().cached_settings().is_cloud() {
                    items
                        .into_iter()
                        .filter(|item| field_matches(item, source, field, value))
                        .collect()
                } else {
                    engine.store().find_by(collection, field, value).await?
                }
            }
            None => items,
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
            OutputFormat::Text => {
                if items.is_empty() {
                    println!("No {} found.", collection);
                } else {
                    for item in &items {
                        let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
                        println!("{}  {}", id, item);
                    }
                    println!("\n{} record(s)", items.len());
                }
            }
        }

        let freshness = engine.freshness(collection);
        if freshness == staybook::Freshness::RemoteUnavailable {
            eprintln!("Warning: remote store unavailable, showing no cloud data");
        }
        Ok(())
    }

    fn filter(&self) -> Option<(IndexField, &str)> {
        if let Some(status) = &self.status {
            return Some((IndexField::Status, status.as_str()));
        }
        if let Some(category) = &self.category {
            return Some((IndexField::Category, category.as_str()));
        }
        self.date.as_deref().map(|date| (IndexField::Date, date))
    }
}

fn field_matches(item: &Value, source: &str, field: IndexField, wanted: &str) -> bool {
    let Some(actual) = item.get(source).and_then(Value::as_str) else {
        return false;
    };
    match field {
        IndexField::Date => actual.get(..10).unwrap_or(actual) == wanted.get(..10).unwrap_or(wanted),
        _ => actual == wanted,
    }
}

/// Replace a collection with the records in a JSON file
#[derive(Args)]
pub struct PutCommand {
    /// Collection key (rooms, guests, staff, ...)
    collection: Collection,

    /// JSON file holding an array of records
    #[arg(long)]
    file: PathBuf,
}

impl PutCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
        let contents = tokio::fs::read_to_string(&self.file)
            .await
            .map_err(|e| format!("Failed to read {}: {}", self.file.display(), e))?;
        let items: Vec<Value> = serde_json::from_str(&contents)
            .map_err(|e| format!("{} is not a JSON array: {}", self.file.display(), e))?;

        let count = items.len();
        let outcome = engine.save_values(self.collection, items).await?;

        match &outcome {
            SaveOutcome::Synced => println!("Saved {} {} and synced.", count, self.collection),
            _ => println!("Saved {} {} locally.", count, self.collection),
        }
        if let Some(warning) = outcome.warning() {
            eprintln!("Warning: {}", warning);
        }
        Ok(())
    }
}
