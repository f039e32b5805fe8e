/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use log::{error, warn};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PublishErrorKind {
    Write,
    Ping,
    Rebuild,
}

impl PublishErrorKind {
    const fn index(self) -> usize {
        match self {
            PublishErrorKind::Write => 0,
            PublishErrorKind::Ping => 1,
            PublishErrorKind::Rebuild => 2,
        }
    }
}

/// Logs publication errors at most once per 64s time slice for each kind.
pub(crate) struct ErrorReporter {
    create_instant: Instant,
    last_report: [Option<u64>; 3],
}

impl ErrorReporter {
    pub(crate) fn new() -> Self {
        ErrorReporter {
            create_instant: Instant::now(),
            last_report: [None; 3],
        }
    }

    fn should_report(&mut self, kind: PublishErrorKind) -> bool {
        let time_slice = self.create_instant.elapsed().as_secs() >> 6;
        let last = &mut self.last_report[kind.index()];
        if *last == Some(time_slice) {
            false
        } else {
            *last = Some(time_slice);
            true
        }
    }

    pub(crate) fn report(&mut self, kind: PublishErrorKind, e: &anyhow::Error) {
        if !self.should_report(kind) {
            return;
        }
        match kind {
            PublishErrorKind::Write => error!("failed to write metrics to influxdb: {e:?}"),
            PublishErrorKind::Ping => warn!("influxdb ping failed, will reconnect: {e:?}"),
            PublishErrorKind::Rebuild => {
                warn!("failed to rebuild influxdb client, keep the old one: {e:?}")
            }
        }
    }
}
