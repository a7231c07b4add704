use std::path::PathBuf;

use arrow::datatypes::{DataType, Field, Schema};
use log::debug;

use netprep_input::columns::{
    AGENT_ID, COORD_X, COORD_Y, ROAD_DATA, TIME_STEP, VEH_TYPE, VELOCITY,
};
use netprep_output::result::{ResultWriter, WriterType};

use crate::produce::config::TraceSettings;
use crate::vehicles::cache::{TraceCache, TraceInfo};

pub(crate) struct TraceWriter {
    writer: WriterType,
    trace_cache: TraceCache,
}

impl ResultWriter for TraceWriter {
    fn schema() -> Schema {
        let time_ms = Field::new(TIME_STEP, DataType::UInt64, false);
        let agent_id = Field::new(AGENT_ID, DataType::UInt64, false);
        let x = Field::new(COORD_X, DataType::Float64, false);
        let y = Field::new(COORD_Y, DataType::Float64, false);
        let velocity = Field::new(VELOCITY, DataType::Float64, false);
        let road_data = Field::new(ROAD_DATA, DataType::Utf8, false);
        let veh_type = Field::new(VEH_TYPE, DataType::Utf8, false);
        Schema::new(vec![
            time_ms, agent_id, x, y, velocity, road_data, veh_type,
        ])
    }

    fn write_to_file(&mut self) {
        if self.trace_cache.is_full() {
            debug!("Trace cache is full, writing");
            self.writer
                .record_batch_to_file(&self.trace_cache.as_record_batch());
        }
    }

    fn close_file(mut self) {
        debug!(r"Trace parsing is done. Flushing the cache to file");
        self.writer
            .record_batch_to_file(&self.trace_cache.as_record_batch());
        self.writer.close();
    }
}

impl TraceWriter {
    pub(crate) fn new(trace_settings: &TraceSettings) -> Self {
        let trace_file = PathBuf::from(trace_settings.output_trace.to_owned());
        let writer = WriterType::new(&trace_file, Self::schema());
        let cache_size = 10000;
        Self {
            writer,
            trace_cache: TraceCache::new(cache_size),
        }
    }

    pub(crate) fn store_info(&mut self, trace_info: TraceInfo) {
        self.trace_cache.append_trace(trace_info);
    }
}
