use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use netprep_core::times::TimeMS;
use netprep_output::result::ResultWriter;
use netprep_output::ui::SimUIMetadata;

use crate::links::config::{Config, DeviceCount, Radius};
use crate::links::reader::{ConstantReader, MobileReader};
use crate::links::tree::{build_position_tree, n2n_links_with_radius, DeviceTree};
use crate::links::writer::LinksWriter;

const LINKS_FOLDER: &str = "links";
const LINK_CACHE_SIZE: usize = 100_000;

/// Derives the six link tables from the position tables.
///
/// The infrastructure tables (R2R, R2C, C2R) are computed once during
/// initialization. The vehicle tables (V2R, R2V, V2V) are computed per
/// timestep by [`find_links_at`], which must be called with non-decreasing
/// timesteps because the vehicle reader only moves forward.
///
/// [`find_links_at`]: LinkFinder::find_links_at
pub(crate) struct LinkFinder {
    pub(crate) step_size: TimeMS,
    pub(crate) duration: TimeMS,
    v2r_count: DeviceCount,
    r2v_radius: Radius,
    v2v_radius: Radius,
    r2r_count: DeviceCount,
    r2c_radius: Radius,
    c2r_radius: Radius,
    config: Config,
    vehicle_reader: Option<MobileReader>,
    rsu_tree: Option<DeviceTree>,
    controller_tree: Option<DeviceTree>,
    v2r_writer: Option<LinksWriter>,
    r2v_writer: Option<LinksWriter>,
    v2v_writer: Option<LinksWriter>,
}

impl LinkFinder {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            step_size: config.settings.step_size,
            duration: config.settings.duration,
            v2r_count: config.link_settings.v2r_count,
            r2v_radius: config.link_settings.r2v_radius,
            v2v_radius: config.link_settings.v2v_radius,
            r2r_count: config.link_settings.r2r_count,
            r2c_radius: config.link_settings.r2c_radius,
            c2r_radius: config.link_settings.c2r_radius,
            vehicle_reader: None,
            rsu_tree: None,
            controller_tree: None,
            v2r_writer: None,
            r2v_writer: None,
            v2v_writer: None,
            config,
        }
    }

    pub(crate) fn build_link_metadata(&self) -> SimUIMetadata {
        SimUIMetadata {
            scenario: "link_calculation".to_string(),
            input_file: self.config.position_files.vehicle_positions.to_string(),
            output_path: self.config.settings.output_path.to_string(),
            log_path: self.config.log_settings.log_path.clone(),
        }
    }

    pub(crate) fn initialize(&mut self) {
        info!("Preparing the position trees");
        let mut rsu_reader = ConstantReader::new(&self.config.position_files.rsu_positions);
        rsu_reader.initialize();
        self.rsu_tree = Some(DeviceTree::new(rsu_reader.positions));

        let mut controller_reader =
            ConstantReader::new(&self.config.position_files.controller_positions);
        controller_reader.initialize();
        self.controller_tree = Some(DeviceTree::new(controller_reader.positions));

        info!("Creating the input trace reader");
        let mut vehicle_reader = MobileReader::new(&self.config.position_files.vehicle_positions);
        vehicle_reader.initialize();
        self.vehicle_reader = Some(vehicle_reader);

        info!("Creating the output writers");
        let links_path = PathBuf::from(&self.config.settings.output_path).join(LINKS_FOLDER);
        if !links_path.exists() {
            fs::create_dir_all(&links_path).expect("Failed to create the links directory");
        }
        self.v2r_writer = Some(LinksWriter::new(
            &links_path.join("v2r_links.parquet"),
            LINK_CACHE_SIZE,
        ));
        self.r2v_writer = Some(LinksWriter::new(
            &links_path.join("r2v_links.parquet"),
            LINK_CACHE_SIZE,
        ));
        self.v2v_writer = Some(LinksWriter::new(
            &links_path.join("v2v_links.parquet"),
            LINK_CACHE_SIZE,
        ));

        self.calculate_static_links(&links_path);
    }

    /// The infrastructure does not move, so these tables are written in one
    /// go and their writers closed before the time loop starts.
    fn calculate_static_links(&mut self, links_path: &PathBuf) {
        info!("Calculating infrastructure to infrastructure links");
        let rsu_tree = self.rsu_tree.as_ref().expect("rsu tree is not prepared");
        let controller_tree = self
            .controller_tree
            .as_ref()
            .expect("controller tree is not prepared");

        let mut r2r_writer =
            LinksWriter::new(&links_path.join("r2r_links.parquet"), LINK_CACHE_SIZE);
        r2r_writer.write_links(&rsu_tree.i2i_links_with_count(self.r2r_count));
        r2r_writer.close_file();

        let mut r2c_writer =
            LinksWriter::new(&links_path.join("r2c_links.parquet"), LINK_CACHE_SIZE);
        r2c_writer.write_links(&rsu_tree.i2other_links_with_radius(
            controller_tree,
            TimeMS::default(),
            self.r2c_radius,
        ));
        r2c_writer.close_file();

        let mut c2r_writer =
            LinksWriter::new(&links_path.join("c2r_links.parquet"), LINK_CACHE_SIZE);
        c2r_writer.write_links(&controller_tree.i2other_links_with_radius(
            rsu_tree,
            TimeMS::default(),
            self.c2r_radius,
        ));
        c2r_writer.close_file();
    }

    /// Vehicle links for one timestep. A timestep with no vehicles is
    /// skipped, it is not an error.
    pub(crate) fn find_links_at(&mut self, now: TimeMS) {
        debug!("Calculating links for time step {}", now);
        let vehicle_reader = self
            .vehicle_reader
            .as_mut()
            .expect("vehicle reader is not prepared");
        let veh_positions = match vehicle_reader.positions_at(now) {
            Some(positions) => positions,
            None => return,
        };
        if veh_positions.is_empty() {
            return;
        }

        let rsu_tree = self.rsu_tree.as_ref().expect("rsu tree is not prepared");
        let v2r_links = rsu_tree.n2i_links_with_count(veh_positions, now, self.v2r_count);
        self.v2r_writer
            .as_mut()
            .expect("v2r writer is not prepared")
            .write_links(&v2r_links);

        // The vehicles moved, so the tree over them is rebuilt from scratch
        // and discarded with this timestep.
        let veh_tree = build_position_tree(veh_positions);
        let r2v_links = rsu_tree.i2n_links_with_radius(&veh_tree, now, self.r2v_radius);
        self.r2v_writer
            .as_mut()
            .expect("r2v writer is not prepared")
            .write_links(&r2v_links);

        if veh_positions.len() > 1 {
            let v2v_links = n2n_links_with_radius(veh_positions, &veh_tree, now, self.v2v_radius);
            self.v2v_writer
                .as_mut()
                .expect("v2v writer is not prepared")
                .write_links(&v2v_links);
        }
    }

    pub(crate) fn complete(self) {
        self.v2r_writer
            .expect("v2r writer is not prepared")
            .close_file();
        self.r2v_writer
            .expect("r2v writer is not prepared")
            .close_file();
        self.v2v_writer
            .expect("v2v writer is not prepared")
            .close_file();
        info!("Link calculation is completed");
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use netprep_input::batch::{read_f64_column, read_u64_column};
    use netprep_input::columns::{AGENT_ID, DISTANCE, TARGET_ID, TIME_STEP};
    use netprep_output::logger::LogSettings;

    use crate::links::config::{LinkSettings, PositionFiles, Settings};
    use crate::links::reader::tests::write_position_table;

    use super::*;

    fn read_links(path: &PathBuf) -> Vec<(u64, u64, u64, f64)> {
        let file = File::open(path).expect("failed to open links file");
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .expect("failed to build reader")
            .build()
            .expect("failed to build reader");
        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.expect("failed to read batch");
            let times = read_u64_column(TIME_STEP, &batch);
            let sources = read_u64_column(AGENT_ID, &batch);
            let targets = read_u64_column(TARGET_ID, &batch);
            let distances = read_f64_column(DISTANCE, &batch);
            for i in 0..times.len() {
                rows.push((times[i], sources[i], targets[i], distances[i]));
            }
        }
        rows.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        rows
    }

    fn assert_rows(actual: &[(u64, u64, u64, f64)], expected: &[(u64, u64, u64, f64)]) {
        assert_eq!(actual.len(), expected.len());
        for (actual_row, expected_row) in actual.iter().zip(expected.iter()) {
            assert_eq!(actual_row.0, expected_row.0);
            assert_eq!(actual_row.1, expected_row.1);
            assert_eq!(actual_row.2, expected_row.2);
            assert!((actual_row.3 - expected_row.3).abs() < 1e-9);
        }
    }

    #[test]
    fn link_tables_for_a_small_scenario() {
        let dir = std::env::temp_dir().join(format!("netprep_linker_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("failed to create test dir");

        let vehicle_file = dir.join("vehicle_positions.parquet");
        write_position_table(
            &vehicle_file,
            &[
                (0, 1, 1.0, 0.0),
                (1000, 1, 6.0, 0.0),
                (1000, 2, 0.0, 0.0),
            ],
            100,
        );
        let rsu_file = dir.join("rsu_positions.parquet");
        write_position_table(&rsu_file, &[(0, 1001, 0.0, 0.0), (0, 1002, 10.0, 0.0)], 100);
        let controller_file = dir.join("controller_positions.parquet");
        write_position_table(&controller_file, &[(0, 2001, 0.0, 0.0)], 100);

        let config = Config {
            log_settings: LogSettings {
                log_path: dir.to_str().expect("bad path").to_string(),
                log_level: "info".to_string(),
                log_file_name: "links.log".to_string(),
                log_overwrite: true,
            },
            settings: Settings {
                step_size: TimeMS::from(1000u64),
                duration: TimeMS::from(2000u64),
                output_path: dir.to_str().expect("bad path").to_string(),
            },
            link_settings: LinkSettings {
                v2r_count: DeviceCount::from(1),
                r2v_radius: Radius::from(5.0),
                v2v_radius: Radius::from(10.0),
                r2r_count: DeviceCount::from(1),
                r2c_radius: Radius::from(100.0),
                c2r_radius: Radius::from(100.0),
            },
            position_files: PositionFiles {
                vehicle_positions: vehicle_file.to_str().expect("bad path").to_string(),
                rsu_positions: rsu_file.to_str().expect("bad path").to_string(),
                controller_positions: controller_file.to_str().expect("bad path").to_string(),
            },
        };

        let mut finder = LinkFinder::new(config);
        finder.initialize();
        let mut now = TimeMS::default();
        while now < finder.duration {
            finder.find_links_at(now);
            now += finder.step_size;
        }
        finder.complete();

        let links_dir = dir.join("links");
        // Vehicle 1 starts next to the first RSU and moves toward the other;
        // vehicle 2 appears on top of the first RSU at the second step.
        assert_rows(
            &read_links(&links_dir.join("v2r_links.parquet")),
            &[
                (0, 1, 1001, 1.0),
                (1000, 1, 1002, 4.0),
                (1000, 2, 1001, 0.0),
            ],
        );
        assert_rows(
            &read_links(&links_dir.join("r2v_links.parquet")),
            &[
                (0, 1001, 1, 1.0),
                (1000, 1001, 2, 0.0),
                (1000, 1002, 1, 4.0),
            ],
        );
        assert_rows(
            &read_links(&links_dir.join("v2v_links.parquet")),
            &[(1000, 1, 2, 6.0), (1000, 2, 1, 6.0)],
        );
        assert_rows(
            &read_links(&links_dir.join("r2r_links.parquet")),
            &[(0, 1001, 1002, 10.0), (0, 1002, 1001, 10.0)],
        );
        assert_rows(
            &read_links(&links_dir.join("r2c_links.parquet")),
            &[(0, 1001, 2001, 0.0), (0, 1002, 2001, 10.0)],
        );
        assert_rows(
            &read_links(&links_dir.join("c2r_links.parquet")),
            &[(0, 2001, 1001, 0.0), (0, 2001, 1002, 10.0)],
        );
    }
}
