use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use hashbrown::HashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use netprep_core::times::TimeMS;

use crate::produce::config::{TraceSettings, TraceSource};
use crate::vehicles::network::{OffsetReader, SumoOffsets};

/// One observation of one vehicle. Velocity, road data and vehicle type are
/// carried through to the position table untouched.
#[derive(Clone, Debug, Default)]
pub(crate) struct FcdRecord {
    pub(crate) agent_id: u64,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) velocity: f64,
    pub(crate) road_data: String,
    pub(crate) veh_type: String,
}

/// All observations of a single timestep, with the raw trace time in ms.
pub(crate) struct TraceBlock {
    pub(crate) time_ms: TimeMS,
    pub(crate) records: Vec<FcdRecord>,
}

pub(crate) enum TraceReader {
    Sumo(SumoReader),
}

impl TraceReader {
    pub(crate) fn new(trace_settings: &TraceSettings) -> Self {
        match trace_settings.trace_source {
            TraceSource::Sumo => TraceReader::Sumo(SumoReader::new(trace_settings)),
        }
    }

    pub(crate) fn initialize(&mut self) {
        match self {
            TraceReader::Sumo(sumo) => sumo.initialize(),
        }
    }

    pub(crate) fn read_block(&mut self) -> Option<TraceBlock> {
        match self {
            TraceReader::Sumo(sumo) => sumo.read_block(),
        }
    }
}

pub(crate) struct SumoReader {
    reader: Reader<BufReader<File>>,
    conversion_factor: TimeMS,
    agent_id_map: HashMap<String, u64>,
    current_id: u64,
    network_reader: OffsetReader,
    offsets: Option<SumoOffsets>,
}

impl SumoReader {
    pub(crate) fn new(trace_settings: &TraceSettings) -> Self {
        let reader = Reader::from_file(&trace_settings.input_trace)
            .expect("Failed to create XML reader for the trace file");
        Self {
            reader,
            conversion_factor: trace_settings.time_conversion,
            network_reader: OffsetReader::new(&trace_settings.input_network),
            agent_id_map: HashMap::new(),
            current_id: trace_settings.starting_id,
            offsets: None,
        }
    }

    fn initialize(&mut self) {
        self.network_reader.initialize();
        self.offsets = Some(self.network_reader.peek_offsets());
    }

    /// Reads the next timestep block from the trace. None marks the end of
    /// the trace.
    fn read_block(&mut self) -> Option<TraceBlock> {
        let mut buffer = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buffer) {
                Err(error) => panic!(
                    "Failed to read trace xml at position {} with error {:?}",
                    self.reader.buffer_position(),
                    error
                ),
                Ok(Event::Start(tag_begin)) => {
                    if tag_begin.name().as_ref() == b"timestep" {
                        let time_ms = self.get_time_step(&tag_begin);
                        let records = self.read_vehicle_data();
                        return Some(TraceBlock { time_ms, records });
                    }
                }
                // A timestep with no observations is written as a
                // self-closing tag. It still ends the timestep.
                Ok(Event::Empty(tag_begin)) => {
                    if tag_begin.name().as_ref() == b"timestep" {
                        let time_ms = self.get_time_step(&tag_begin);
                        return Some(TraceBlock {
                            time_ms,
                            records: Vec::new(),
                        });
                    }
                }
                Ok(Event::Eof) => return None,
                _ => {}
            }
            buffer.clear();
        }
    }

    fn get_time_step(&self, time_step_event: &BytesStart) -> TimeMS {
        // Read the time attribute in seconds and convert it into ms.
        for attribute in time_step_event.attributes() {
            let attribute = attribute.expect("failed to read timestep attribute");
            if attribute.key.as_ref() == b"time" {
                let time_str =
                    std::str::from_utf8(&attribute.value).expect("failed to read time value");
                let time_stamp =
                    f64::from_str(time_str).expect("failed to parse timestep to float");
                return TimeMS::from((time_stamp * self.conversion_factor.as_f64()).round() as u64);
            }
        }
        panic!("Timestep tag is missing the time attribute");
    }

    fn read_vehicle_data(&mut self) -> Vec<FcdRecord> {
        let mut temp_buffer: Vec<u8> = Vec::new();
        let mut records: Vec<FcdRecord> = Vec::new();
        loop {
            let vehicle_tag_event = self
                .reader
                .read_event_into(&mut temp_buffer)
                .expect("failed to read vehicle info");

            match &vehicle_tag_event {
                Event::Empty(vehicle_tag) => records.push(self.parse_vehicle_event(vehicle_tag)),
                Event::End(_) => return records,
                Event::Eof => panic!("Trace ended in the middle of a timestep block"),
                _ => {}
            }
            temp_buffer.clear();
        }
    }

    fn parse_vehicle_event(&mut self, vehicle_tag: &BytesStart) -> FcdRecord {
        let mut record = FcdRecord::default();
        for attribute in vehicle_tag.attributes() {
            let attribute = attribute.expect("failed to read vehicle attribute");
            let value =
                std::str::from_utf8(&attribute.value).expect("failed to read attribute value");
            match attribute.key.as_ref() {
                b"id" => record.agent_id = self.get_vehicle_id(value),
                b"x" => record.x = f64::from_str(value).expect("failed to parse x to float"),
                b"y" => record.y = f64::from_str(value).expect("failed to parse y to float"),
                b"speed" => {
                    record.velocity = f64::from_str(value).expect("failed to parse speed to float")
                }
                b"lane" => record.road_data = value.to_string(),
                b"type" => record.veh_type = value.to_string(),
                _ => {}
            }
        }
        record = self.handle_offsets(record);
        record
    }

    fn get_vehicle_id(&mut self, id: &str) -> u64 {
        match u64::from_str(id) {
            Ok(val) => val,
            Err(_) => match self.agent_id_map.get(id) {
                Some(val) => *val,
                None => {
                    self.current_id += 1;
                    self.agent_id_map.insert(id.to_string(), self.current_id);
                    self.current_id
                }
            },
        }
    }

    fn handle_offsets(&self, mut record: FcdRecord) -> FcdRecord {
        let offsets = self
            .offsets
            .expect("trace reader used before initialization");
        record.x = offsets.subtract_x_offset(record.x);
        record.y = offsets.subtract_y_offset(record.y);
        record
    }
}
