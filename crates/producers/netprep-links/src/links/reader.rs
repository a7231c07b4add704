use std::fs::File;
use std::path::PathBuf;

use arrow::array::RecordBatch;
use hashbrown::HashMap;
use log::debug;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::file::reader::{FileReader, SerializedFileReader};

use netprep_core::agent::AgentId;
use netprep_core::times::TimeMS;
use netprep_input::batch::{read_f64_column, read_u64_column};
use netprep_input::columns::{AGENT_ID, COORD_X, COORD_Y, TIME_STEP};

pub(crate) type AgentIdPos = Vec<(AgentId, [f64; 2])>;
pub(crate) type PositionMap = HashMap<TimeMS, AgentIdPos>;

/// Reads a static position table in one go. Roadside units and controllers
/// do not move, so their table is small and read once.
pub(crate) struct ConstantReader {
    file_path: PathBuf,
    pub(crate) positions: AgentIdPos,
}

impl ConstantReader {
    pub(crate) fn new(position_file: &str) -> Self {
        Self {
            file_path: PathBuf::from(position_file.to_owned()),
            positions: AgentIdPos::default(),
        }
    }

    pub(crate) fn initialize(&mut self) {
        let reader = self.get_batch_reader();
        for record_batch in reader {
            let record_batch: RecordBatch = match record_batch {
                Ok(batch) => batch,
                Err(e) => panic!("Error reading record batch: {}", e),
            };

            let batch_size = record_batch.num_rows();
            let agent_ids: Vec<AgentId> = read_u64_column(AGENT_ID, &record_batch)
                .into_iter()
                .map(AgentId::from)
                .collect();
            let x_positions = read_f64_column(COORD_X, &record_batch);
            let y_positions = read_f64_column(COORD_Y, &record_batch);

            for row in 0..batch_size {
                self.positions
                    .push((agent_ids[row], [x_positions[row], y_positions[row]]));
            }
        }
    }

    fn get_batch_reader(&self) -> ParquetRecordBatchReader {
        debug!("Reading file {}", &self.file_path.display());
        let map_file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) => panic!("Error reading file from disk: {}", e),
        };
        let builder = match ParquetRecordBatchReaderBuilder::try_new(map_file) {
            Ok(builder) => builder,
            Err(e) => panic!("Error building parquet reader: {}", e),
        };
        match builder.build() {
            Ok(reader) => reader,
            Err(e) => panic!("Error building reader: {}", e),
        }
    }
}

/// Forward-only window over the vehicle position table.
///
/// One row group is held in memory at a time. The time loop queries
/// non-decreasing timesteps, so whenever the window's last timestep is
/// reached the next row group is pulled in and its rows for that timestep
/// are merged with the ones already cached; everything older is evicted.
pub(crate) struct MobileReader {
    file_path: PathBuf,
    current_row_group: usize,
    max_row_groups: usize,
    max_ts_in_group: TimeMS,
    file_read: bool,
    positions: PositionMap,
}

impl MobileReader {
    pub(crate) fn new(position_file: &str) -> Self {
        Self {
            file_path: PathBuf::from(position_file.to_owned()),
            positions: PositionMap::default(),
            current_row_group: usize::default(),
            max_row_groups: 0,
            max_ts_in_group: TimeMS::default(),
            file_read: false,
        }
    }

    pub(crate) fn initialize(&mut self) {
        let file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) => panic!("Error reading vehicle positions from disk: {}", e),
        };
        let reader = SerializedFileReader::new(file).expect("Failed to read file");
        let parquet_metadata = reader.metadata();
        self.max_row_groups = parquet_metadata.num_row_groups();
        self.read_next_group();
    }

    /// Positions of all vehicles present at the given timestep. None is a
    /// legitimate result, vehicles can be absent from a timestep.
    ///
    /// Panics once the table has been consumed entirely and a timestep past
    /// its end is requested.
    pub(crate) fn positions_at(&mut self, time_ms: TimeMS) -> Option<&AgentIdPos> {
        while time_ms >= self.max_ts_in_group && !self.file_read {
            self.advance();
        }
        if time_ms > self.max_ts_in_group {
            panic!(
                "Vehicle position input is exhausted, no data at time step {}",
                time_ms
            );
        }
        self.positions.get(&time_ms)
    }

    fn advance(&mut self) {
        // Rows of the boundary timestep stay cached so they can be merged
        // with the next row group's rows for the same timestep.
        let boundary = self.max_ts_in_group;
        self.positions.retain(|time_ms, _| *time_ms >= boundary);
        self.read_next_group();
    }

    fn read_next_group(&mut self) {
        debug!("Reading row group {}", self.current_row_group);
        let reader = self.get_batch_reader();
        for record_batch in reader {
            let record_batch: RecordBatch = match record_batch {
                Ok(batch) => batch,
                Err(e) => panic!("Error reading record batch: {}", e),
            };

            let batch_size = record_batch.num_rows();
            let time_steps: Vec<TimeMS> = read_u64_column(TIME_STEP, &record_batch)
                .into_iter()
                .map(TimeMS::from)
                .collect();
            let agent_ids: Vec<AgentId> = read_u64_column(AGENT_ID, &record_batch)
                .into_iter()
                .map(AgentId::from)
                .collect();
            let x_positions = read_f64_column(COORD_X, &record_batch);
            let y_positions = read_f64_column(COORD_Y, &record_batch);

            for row in 0..batch_size {
                self.positions
                    .entry(time_steps[row])
                    .or_default()
                    .push((agent_ids[row], [x_positions[row], y_positions[row]]));
            }
            if let Some(max_ts) = time_steps.iter().max() {
                self.max_ts_in_group = *max_ts;
            }
        }
        self.current_row_group += 1;
        if self.current_row_group == self.max_row_groups {
            self.file_read = true;
        }
    }

    fn get_batch_reader(&self) -> ParquetRecordBatchReader {
        let map_file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) => panic!("Error reading file from disk: {}", e),
        };
        let builder = match ParquetRecordBatchReaderBuilder::try_new(map_file) {
            Ok(builder) => builder.with_row_groups(vec![self.current_row_group]),
            Err(e) => panic!("Error building parquet reader: {}", e),
        };
        match builder.build() {
            Ok(reader) => reader,
            Err(e) => panic!("Error building reader: {}", e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, UInt64Array};
    use arrow::datatypes::SchemaRef;
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;

    use super::*;

    /// Writes a position table with small row groups so the window logic is
    /// exercised with a handful of rows.
    pub(crate) fn write_position_table(
        path: &PathBuf,
        rows: &[(u64, u64, f64, f64)],
        row_group_size: usize,
    ) {
        let batch = RecordBatch::try_from_iter(vec![
            (
                TIME_STEP,
                Arc::new(UInt64Array::from(
                    rows.iter().map(|row| row.0).collect::<Vec<u64>>(),
                )) as ArrayRef,
            ),
            (
                AGENT_ID,
                Arc::new(UInt64Array::from(
                    rows.iter().map(|row| row.1).collect::<Vec<u64>>(),
                )) as ArrayRef,
            ),
            (
                COORD_X,
                Arc::new(Float64Array::from(
                    rows.iter().map(|row| row.2).collect::<Vec<f64>>(),
                )) as ArrayRef,
            ),
            (
                COORD_Y,
                Arc::new(Float64Array::from(
                    rows.iter().map(|row| row.3).collect::<Vec<f64>>(),
                )) as ArrayRef,
            ),
        ])
        .expect("failed to build record batch");

        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();
        let file = File::create(path).expect("failed to create position table");
        let mut writer = ArrowWriter::try_new(file, SchemaRef::from(batch.schema()), Some(props))
            .expect("failed to create writer");
        writer.write(&batch).expect("failed to write batch");
        writer.close().expect("failed to close writer");
    }

    fn test_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("netprep_reader_{}_{}.parquet", tag, std::process::id()))
    }

    #[test]
    fn window_advances_and_merges_boundary_rows() {
        let path = test_file("window");
        // Timestep 10 is split across the two row groups.
        write_position_table(
            &path,
            &[
                (0, 1, 1.0, 0.0),
                (0, 2, 2.0, 0.0),
                (10, 1, 3.0, 0.0),
                (10, 2, 4.0, 0.0),
                (10, 3, 5.0, 0.0),
                (20, 1, 6.0, 0.0),
            ],
            4,
        );

        let mut reader = MobileReader::new(path.to_str().expect("bad path"));
        reader.initialize();

        let at_zero = reader.positions_at(TimeMS::from(0u64)).expect("no rows");
        assert_eq!(at_zero.len(), 2);

        // The boundary timestep must contain rows from both row groups.
        let at_ten = reader.positions_at(TimeMS::from(10u64)).expect("no rows");
        assert_eq!(at_ten.len(), 3);

        // No vehicle is present at 15, which is fine.
        assert!(reader.positions_at(TimeMS::from(15u64)).is_none());

        let at_twenty = reader.positions_at(TimeMS::from(20u64)).expect("no rows");
        assert_eq!(at_twenty.len(), 1);
        assert_eq!(at_twenty[0].0, AgentId::from(1u64));
        std::fs::remove_file(&path).expect("failed to remove test file");
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn query_past_end_of_input_is_fatal() {
        let path = test_file("exhausted");
        write_position_table(&path, &[(0, 1, 1.0, 0.0), (10, 1, 2.0, 0.0)], 10);

        let mut reader = MobileReader::new(path.to_str().expect("bad path"));
        reader.initialize();
        reader.positions_at(TimeMS::from(10u64));
        reader.positions_at(TimeMS::from(20u64));
    }

    #[test]
    fn constant_reader_loads_all_rows() {
        let path = test_file("constant");
        write_position_table(&path, &[(0, 1001, 0.0, 0.0), (0, 1002, 10.0, 0.0)], 10);

        let mut reader = ConstantReader::new(path.to_str().expect("bad path"));
        reader.initialize();
        assert_eq!(reader.positions.len(), 2);
        assert_eq!(reader.positions[1].0, AgentId::from(1002u64));
        std::fs::remove_file(&path).expect("failed to remove test file");
    }
}
