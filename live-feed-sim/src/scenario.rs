/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use live_feed::{ConfigError, Document, FeedKey, RealtimeConfig};
use serde::Deserialize;
use std::fmt::{self, Debug, Display, Formatter};
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub(crate) realtime: RealtimeConfig,
    #[serde(default)]
    pub(crate) simulate_outage: bool,
    #[serde(default = "default_update_interval_ms")]
    pub(crate) update_interval_ms: u64,
    pub(crate) feeds: Vec<FeedScenario>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct FeedScenario {
    pub(crate) key: FeedKey,
    #[serde(default = "default_consumers")]
    pub(crate) consumers: usize,
    /// Snapshot every new listener delivers immediately.
    #[serde(default)]
    pub(crate) documents: Vec<Document>,
    /// Snapshots pushed to open listeners one interval apart.
    #[serde(default)]
    pub(crate) updates: Vec<Vec<Document>>,
}

fn default_update_interval_ms() -> u64 {
    100
}

fn default_consumers() -> usize {
    1
}

impl Scenario {
    pub(crate) fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        json5::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            message: err.to_string(),
        })
    }
}

pub(crate) enum SimError {
    Config(ConfigError),
    Report(serde_json::Error),
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        SimError::Config(err)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Report(err)
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(err) => write!(f, "{err}"),
            SimError::Report(err) => write!(f, "unable to render report: {err}"),
        }
    }
}

impl Debug for SimError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
