//! Station call letter records
//!
//! The payload is a flat run of 8-octet ASCII labels, right-padded with
//! spaces. Vector data records that follow a station list hold one value per
//! label, in list order.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Result, TdlpackError};

/// Width of one label on disk
pub const STATION_LABEL_LEN: usize = 8;

/// An ordered list of station labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationList {
    labels: Vec<String>,
}

impl StationList {
    /// Build a list for writing. Labels must be distinct, non-empty ASCII of
    /// at most 8 characters, without leading or trailing whitespace.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if label.is_empty() || label.len() > STATION_LABEL_LEN || !label.is_ascii() {
                return Err(TdlpackError::validation(format!(
                    "station label {:?} must be 1-{} ASCII characters",
                    label, STATION_LABEL_LEN
                )));
            }
            if label.trim() != label {
                return Err(TdlpackError::validation(format!(
                    "station label {:?} has leading or trailing whitespace",
                    label
                )));
            }
            if !seen.insert(label.as_str()) {
                return Err(TdlpackError::validation(format!(
                    "duplicate station label {:?}",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of a label within the list
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Are the labels in ascending order?
    pub fn is_sorted(&self) -> bool {
        self.labels.windows(2).all(|pair| pair[0] < pair[1])
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.labels.len() * STATION_LABEL_LEN);
        for label in &self.labels {
            buf.extend_from_slice(format!("{:<width$}", label, width = STATION_LABEL_LEN).as_bytes());
        }
        buf
    }

    pub(crate) fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() % STATION_LABEL_LEN != 0 {
            return Err(TdlpackError::format(format!(
                "station list payload of {} octets is not a multiple of {}",
                raw.len(),
                STATION_LABEL_LEN
            )));
        }
        let labels: Vec<String> = raw
            .chunks_exact(STATION_LABEL_LEN)
            .map(|chunk| {
                String::from_utf8_lossy(chunk)
                    .trim_end_matches([' ', '\0'])
                    .to_string()
            })
            .collect();

        let mut seen = HashSet::with_capacity(labels.len());
        if let Some(duplicate) = labels.iter().find(|label| !seen.insert(label.as_str())) {
            return Err(TdlpackError::format(format!(
                "station list repeats label {:?}",
                duplicate
            )));
        }
        Ok(Self { labels })
    }
}
