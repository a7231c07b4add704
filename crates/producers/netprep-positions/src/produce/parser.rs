use log::{debug, info};

use netprep_core::times::TimeMS;
use netprep_output::result::ResultWriter;
use netprep_output::ui::SimUIMetadata;

use crate::produce::config::Config;
use crate::vehicles::activation::{ActivationTracker, ActivationWriter};
use crate::vehicles::cache::TraceInfo;
use crate::vehicles::trace::TraceReader;
use crate::vehicles::writer::TraceWriter;

/// Streams the mobility trace into the position and activation tables.
///
/// The first timestep found in the trace becomes the time origin, so the
/// output timeline always starts at zero regardless of when the recording
/// started.
pub(crate) struct TraceParser {
    pub(crate) duration: TimeMS,
    config: Config,
    reader: TraceReader,
    activations: ActivationTracker,
    activation_writer: ActivationWriter,
    trace_writer: TraceWriter,
    time_origin: Option<TimeMS>,
}

impl TraceParser {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            duration: config.timing_settings.duration,
            reader: TraceReader::new(&config.trace_settings),
            activations: ActivationTracker::new(),
            activation_writer: ActivationWriter::new(&config.trace_settings),
            trace_writer: TraceWriter::new(&config.trace_settings),
            time_origin: None,
            config,
        }
    }

    pub(crate) fn build_trace_metadata(&self) -> SimUIMetadata {
        SimUIMetadata {
            scenario: "trace_conversion".to_string(),
            input_file: self.config.trace_settings.input_trace.to_string(),
            output_path: self.config.trace_settings.output_trace.to_string(),
            log_path: self.config.log_settings.log_path.clone(),
        }
    }

    pub(crate) fn initialize(&mut self) {
        self.reader.initialize();
    }

    /// Ingests the next timestep block of the trace. Returns the normalized
    /// timestep, or None once the trace is exhausted.
    pub(crate) fn parse_next_step(&mut self) -> Option<TimeMS> {
        let block = self.reader.read_block()?;
        let origin = *self.time_origin.get_or_insert(block.time_ms);
        let now = block.time_ms - origin;
        debug!("Parsing trace block at {}", now);

        for record in block.records {
            self.activations.observe(record.agent_id, now);
            self.trace_writer.store_info(
                TraceInfo::builder()
                    .time_ms(now.as_u64())
                    .agent_id(record.agent_id)
                    .x(record.x)
                    .y(record.y)
                    .velocity(record.velocity)
                    .road_data(record.road_data)
                    .veh_type(record.veh_type)
                    .build(),
            );
        }
        self.activations.end_step(now);
        self.trace_writer.write_to_file();
        Some(now)
    }

    pub(crate) fn complete(self) {
        self.trace_writer.close_file();
        let unique_vehicles = self.activations.unique_agents();
        let activations = self.activations.finalize();
        let mut activation_writer = self.activation_writer;
        activation_writer.write_activations(&activations);
        activation_writer.close_file();
        info!("Parsed {} unique vehicles from the trace", unique_vehicles);
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use netprep_input::batch::{read_f64_column, read_string_column, read_u64_column};
    use netprep_input::columns::{
        AGENT_ID, COORD_X, NS3_ID, OFF_TIMES, ON_TIMES, ROAD_DATA, TIME_STEP,
    };
    use netprep_output::logger::LogSettings;

    use crate::produce::config::{TimingSettings, TraceSettings, TraceSource};

    use super::*;

    fn write_file(path: &PathBuf, content: &str) {
        let mut file = File::create(path).expect("failed to create file");
        file.write_all(content.as_bytes())
            .expect("failed to write file");
    }

    fn read_all_columns(path: &PathBuf) -> Vec<arrow::array::RecordBatch> {
        let file = File::open(path).expect("failed to open parquet file");
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .expect("failed to build reader")
            .build()
            .expect("failed to build reader");
        reader
            .map(|batch| batch.expect("failed to read batch"))
            .collect()
    }

    fn test_config(tag: &str) -> Config {
        let dir = std::env::temp_dir().join(format!("netprep_parser_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).expect("failed to create test dir");
        let trace_file = dir.join("fcd.xml");
        let net_file = dir.join("network.net.xml");
        write_file(
            &trace_file,
            r#"<fcd-export>
    <timestep time="600.00">
        <vehicle id="1" x="110.00" y="220.00" type="passenger" speed="13.89" lane="E0_0"/>
        <vehicle id="2" x="150.00" y="250.00" type="passenger" speed="8.33" lane="E1_0"/>
    </timestep>
    <timestep time="601.00">
        <vehicle id="2" x="160.00" y="250.00" type="passenger" speed="10.00" lane="E1_0"/>
    </timestep>
    <timestep time="602.00">
        <vehicle id="1" x="120.00" y="220.00" type="passenger" speed="5.00" lane="E0_0"/>
        <vehicle id="2" x="170.00" y="250.00" type="passenger" speed="10.00" lane="E1_0"/>
    </timestep>
    <timestep time="603.00"/>
</fcd-export>"#,
        );
        write_file(
            &net_file,
            r#"<net><location netOffset="10.0,20.0" convBoundary="0,0,500,500" origBoundary="0,0,1,1" projParameter="!"/></net>"#,
        );
        Config {
            log_settings: LogSettings {
                log_path: dir.to_str().expect("bad path").to_string(),
                log_level: "info".to_string(),
                log_file_name: "test.log".to_string(),
                log_overwrite: true,
            },
            trace_settings: TraceSettings {
                input_trace: trace_file.to_str().expect("bad path").to_string(),
                input_network: net_file.to_str().expect("bad path").to_string(),
                trace_source: TraceSource::Sumo,
                time_conversion: TimeMS::from(1000u64),
                output_trace: dir
                    .join("positions.parquet")
                    .to_str()
                    .expect("bad path")
                    .to_string(),
                starting_id: 1000,
                activation_file: dir
                    .join("activations.parquet")
                    .to_str()
                    .expect("bad path")
                    .to_string(),
            },
            timing_settings: TimingSettings {
                duration: TimeMS::from(3000u64),
                step_size: TimeMS::from(1000u64),
            },
        }
    }

    #[test]
    fn trace_is_normalized_and_tables_written() {
        let config = test_config("full");
        let positions_file = PathBuf::from(config.trace_settings.output_trace.clone());
        let activation_file = PathBuf::from(config.trace_settings.activation_file.clone());

        let mut parser = TraceParser::new(config);
        parser.initialize();
        let mut steps = Vec::new();
        while let Some(now) = parser.parse_next_step() {
            steps.push(now.as_u64());
        }
        parser.complete();

        // The recording started at 600 s but the output timeline starts at
        // 0, and the empty last timestep still ends the timeline.
        assert_eq!(steps, vec![0, 1000, 2000, 3000]);

        let mut time_steps = Vec::new();
        let mut agent_ids = Vec::new();
        let mut xs = Vec::new();
        let mut roads = Vec::new();
        for batch in read_all_columns(&positions_file) {
            time_steps.extend(read_u64_column(TIME_STEP, &batch));
            agent_ids.extend(read_u64_column(AGENT_ID, &batch));
            xs.extend(read_f64_column(COORD_X, &batch));
            roads.extend(read_string_column(ROAD_DATA, &batch));
        }
        assert_eq!(time_steps, vec![0, 0, 1000, 2000, 2000]);
        assert_eq!(agent_ids, vec![1, 2, 2, 1, 2]);
        // Network offsets are subtracted from the raw coordinates.
        assert_eq!(xs, vec![100.0, 140.0, 150.0, 110.0, 160.0]);
        assert_eq!(roads[0], "E0_0");

        let mut activation_rows = Vec::new();
        for batch in read_all_columns(&activation_file) {
            let ids = read_u64_column(AGENT_ID, &batch);
            let ns3_ids = read_u64_column(NS3_ID, &batch);
            let on_times = read_u64_column(ON_TIMES, &batch);
            let off_times = read_u64_column(OFF_TIMES, &batch);
            for i in 0..ids.len() {
                activation_rows.push((ids[i], ns3_ids[i], on_times[i], off_times[i]));
            }
        }
        // Vehicle 1 has a one-step gap, vehicle 2 is continuous.
        assert_eq!(
            activation_rows,
            vec![(1, 1, 0, 0), (1, 1, 2000, 2000), (2, 2, 0, 2000)]
        );
    }
}
