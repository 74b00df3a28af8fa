//! Append-only CSV trade journal, one row per executed order.

use crate::domain::{OrderReceipt, OrderSide, TradingPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub symbol: TradingPair,
    pub amount: f64,
    pub price: Option<f64>,
    pub order_id: String,
    /// Stop level after the order (set on entries, empty on exits).
    pub trailing_stop: Option<f64>,
}

impl JournalEntry {
    pub fn from_receipt(
        receipt: &OrderReceipt,
        timestamp: DateTime<Utc>,
        trailing_stop: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            side: receipt.side,
            symbol: receipt.pair.clone(),
            amount: receipt.amount,
            price: receipt.average_price,
            order_id: receipt.order_id.clone(),
            trailing_stop,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    /// Journal at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row; the header is written when the file is new or empty.
    pub fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let io_err = |source| JournalError::Io {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let is_empty = file.metadata().map_err(io_err)?.len() == 0;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        wtr.serialize(entry)?;
        wtr.flush().map_err(io_err)?;
        Ok(())
    }

    /// Every row written so far, oldest first.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path)?;
        rdr.deserialize()
            .collect::<Result<Vec<JournalEntry>, _>>()
            .map_err(JournalError::from)
    }
}
