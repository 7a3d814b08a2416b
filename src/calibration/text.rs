//! Calibration text loading

use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::hub::{FetchOptions, HfHubFetcher};

use super::dataset::{
    join_wikitext_rows, CalibrationSource, C4_REPO, C4_TRAIN_FILE, WIKITEXT2_ROWS,
    WIKITEXT2_TRAIN_FILE, WIKITEXT_REPO,
};
use super::error::{CalibrationError, Result};

/// Raw calibration data before tokenization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalibrationCorpus {
    /// One running text, windowed after tokenization
    Text(String),
    /// Independent documents, one window cut from each drawn document
    Documents(Vec<String>),
}

/// Load the raw calibration data for a source
///
/// # Errors
///
/// Returns error if the dataset cannot be fetched or read, or is empty.
pub fn load_corpus(
    source: &CalibrationSource,
    fetcher: &HfHubFetcher,
    options: &FetchOptions,
) -> Result<CalibrationCorpus> {
    let options = options.clone().revision("main");
    let corpus = match source {
        CalibrationSource::WikiText2 => {
            let path = fetcher.fetch_dataset_file(WIKITEXT_REPO, WIKITEXT2_TRAIN_FILE, &options)?;
            let rows = read_text_column(&path, "text", WIKITEXT2_ROWS)?;
            CalibrationCorpus::Text(join_wikitext_rows(&rows))
        }
        CalibrationSource::C4 => {
            let path = fetcher.fetch_dataset_file(C4_REPO, C4_TRAIN_FILE, &options)?;
            CalibrationCorpus::Documents(read_json_lines_gz(&path, "text")?)
        }
        CalibrationSource::LocalText(path) => {
            CalibrationCorpus::Text(std::fs::read_to_string(path)?)
        }
    };

    let empty = match &corpus {
        CalibrationCorpus::Text(text) => text.trim().is_empty(),
        CalibrationCorpus::Documents(documents) => documents.iter().all(|d| d.trim().is_empty()),
    };
    if empty {
        return Err(CalibrationError::EmptyText(source.to_string()));
    }
    Ok(corpus)
}

/// Read a string field from every line of a gzipped JSON-lines file
///
/// # Errors
///
/// Returns error if the file cannot be decompressed or a line lacks the field.
pub fn read_json_lines_gz(path: &Path, field: &str) -> Result<Vec<String>> {
    let reader = BufReader::new(GzDecoder::new(std::fs::File::open(path)?));
    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let text = serde_json::from_str::<serde_json::Value>(&line)
            .ok()
            .and_then(|value| value.get(field).and_then(|v| v.as_str()).map(str::to_string))
            .ok_or_else(|| CalibrationError::Document {
                path: path.display().to_string(),
                line: index + 1,
                field: field.to_string(),
            })?;
        documents.push(text);
    }
    Ok(documents)
}

/// Read up to `limit` rows of a string column from a parquet file
#[cfg(feature = "parquet")]
pub fn read_text_column(path: &Path, column: &str, limit: usize) -> Result<Vec<String>> {
    use alimentar::{ArrowDataset, Dataset};
    use arrow::array::{Array, LargeStringArray, StringArray};

    let parquet_err = |message: String| CalibrationError::Parquet {
        path: path.display().to_string(),
        message,
    };

    let dataset = ArrowDataset::from_parquet(path).map_err(|e| parquet_err(e.to_string()))?;
    let schema = dataset.schema();
    let index = schema.index_of(column).map_err(|_| CalibrationError::MissingColumn {
        path: path.display().to_string(),
        column: column.to_string(),
        found: schema.fields().iter().map(|f| f.name().clone()).collect(),
    })?;

    let mut rows = Vec::new();
    for record_batch in dataset.iter() {
        let array = record_batch.column(index);
        if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
            for i in 0..strings.len() {
                if rows.len() == limit {
                    return Ok(rows);
                }
                rows.push(if strings.is_null(i) { String::new() } else { strings.value(i).to_string() });
            }
        } else if let Some(strings) = array.as_any().downcast_ref::<LargeStringArray>() {
            for i in 0..strings.len() {
                if rows.len() == limit {
                    return Ok(rows);
                }
                rows.push(if strings.is_null(i) { String::new() } else { strings.value(i).to_string() });
            }
        } else {
            return Err(parquet_err(format!(
                "column '{column}' has type {:?}, expected a string column",
                array.data_type()
            )));
        }
    }
    Ok(rows)
}

/// Read up to `limit` rows of a string column from a parquet file
#[cfg(not(feature = "parquet"))]
pub fn read_text_column(path: &Path, _column: &str, _limit: usize) -> Result<Vec<String>> {
    Err(CalibrationError::Parquet {
        path: path.display().to_string(),
        message: "built without the `parquet` feature".to_string(),
    })
}
