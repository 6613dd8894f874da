use std::{fs, path::Path};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::Error,
    form::{IngredientRecord, TagRecord},
    store::CatalogStore,
};

/// Outcome of one import run; rerunning the same file only grows `existing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub created: usize,
    pub existing: usize,
}

impl LoadReport {
    fn count(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.existing += 1;
        }
    }
}

/// Reads a JSON array of records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Error> {
    let data = fs::read_to_string(path)
        .map_err(|e| Error::BadRequest(format!("Cannot read {}: {e}", path.display())))?;

    serde_json::from_str(&data)
        .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))
}

pub async fn load_ingredients<S>(
    store: &S,
    records: Vec<IngredientRecord>,
) -> Result<LoadReport, Error>
where
    S: CatalogStore + ?Sized,
{
    let mut report = LoadReport::default();
    for record in records {
        let record = record.validate()?;
        let (_, created) = store.get_or_create_ingredient(&record).await?;
        report.count(created);
    }
    log::info!(
        "Ingredients loaded: {} created, {} already present",
        report.created,
        report.existing
    );

    Ok(report)
}

pub async fn load_tags<S>(store: &S, records: Vec<TagRecord>) -> Result<LoadReport, Error>
where
    S: CatalogStore + ?Sized,
{
    let mut report = LoadReport::default();
    for record in records {
        let record = record.validate()?;
        let (_, created) = store.get_or_create_tag(&record).await?;
        report.count(created);
    }
    log::info!(
        "Tags loaded: {} created, {} already present",
        report.created,
        report.existing
    );

    Ok(report)
}
