use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, RecordBatch, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use log::debug;

use netprep_input::columns::{AGENT_ID, DISTANCE, TARGET_ID, TIME_STEP};
use netprep_output::result::{ResultWriter, WriterType};

use crate::links::tree::LinkRow;

pub(crate) struct LinkCache {
    times: Vec<u64>,
    sources: Vec<u64>,
    targets: Vec<u64>,
    distances: Vec<f64>,
    cache_limit: usize,
}

impl LinkCache {
    pub(crate) fn new(cache_size: usize) -> Self {
        Self {
            times: Vec::with_capacity(cache_size),
            sources: Vec::with_capacity(cache_size),
            targets: Vec::with_capacity(cache_size),
            distances: Vec::with_capacity(cache_size),
            cache_limit: cache_size,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.times.len() >= self.cache_limit
    }

    pub(crate) fn append_link(&mut self, link: &LinkRow) {
        self.times.push(link.time_step);
        self.sources.push(link.agent_id);
        self.targets.push(link.target_id);
        self.distances.push(link.distance);
    }

    pub(crate) fn as_record_batch(&mut self) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                TIME_STEP,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.times))) as ArrayRef,
            ),
            (
                AGENT_ID,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.sources))) as ArrayRef,
            ),
            (
                TARGET_ID,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.targets))) as ArrayRef,
            ),
            (
                DISTANCE,
                Arc::new(Float64Array::from(std::mem::take(&mut self.distances))) as ArrayRef,
            ),
        ])
        .expect("Failed to convert link cache to record batch")
    }
}

/// Writes one link table. Rows accumulate in a columnar cache and are
/// flushed as one batch whenever the cache limit is reached; the flush
/// granularity never changes which rows come out.
pub(crate) struct LinksWriter {
    writer: WriterType,
    cache: LinkCache,
}

impl ResultWriter for LinksWriter {
    fn schema() -> Schema {
        let time_ms = Field::new(TIME_STEP, DataType::UInt64, false);
        let source_id = Field::new(AGENT_ID, DataType::UInt64, false);
        let target_id = Field::new(TARGET_ID, DataType::UInt64, false);
        let distance = Field::new(DISTANCE, DataType::Float64, false);
        Schema::new(vec![time_ms, source_id, target_id, distance])
    }

    fn write_to_file(&mut self) {
        if self.cache.is_full() {
            debug!("Link cache is full, writing");
            self.writer.record_batch_to_file(&self.cache.as_record_batch());
        }
    }

    fn close_file(mut self) {
        self.writer.record_batch_to_file(&self.cache.as_record_batch());
        self.writer.close();
    }
}

impl LinksWriter {
    pub(crate) fn new(output_file: &PathBuf, cache_size: usize) -> Self {
        Self {
            writer: WriterType::new(output_file, Self::schema()),
            cache: LinkCache::new(cache_size),
        }
    }

    pub(crate) fn write_links(&mut self, links: &[LinkRow]) {
        for link in links {
            self.cache.append_link(link);
        }
        self.write_to_file();
    }
}
