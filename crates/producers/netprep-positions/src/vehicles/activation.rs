use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use hashbrown::HashMap;
use log::debug;
use typed_builder::TypedBuilder;

use netprep_core::times::TimeMS;
use netprep_input::columns::{AGENT_ID, NS3_ID, OFF_TIMES, ON_TIMES};
use netprep_output::result::{ResultWriter, WriterType};

use crate::produce::config::TraceSettings;

/// One activation interval of one vehicle, ready to be written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, TypedBuilder)]
pub(crate) struct ActivationInfo {
    pub(crate) agent_id: u64,
    pub(crate) ns3_id: u64,
    pub(crate) on_time: u64,
    pub(crate) off_time: u64,
}

/// Activation intervals of a single vehicle. A vehicle whose trace is
/// disrupted gets a fresh interval when it is observed again.
struct AgentIntervals {
    on_times: Vec<u64>,
    off_times: Vec<u64>,
    disrupted: bool,
}

impl AgentIntervals {
    fn new() -> Self {
        Self {
            on_times: Vec::new(),
            off_times: Vec::new(),
            disrupted: true,
        }
    }
}

/// Tracks which vehicles are present in the trace at each timestep and
/// derives their activation intervals.
///
/// Callers must feed timesteps in order: all observations of a timestep,
/// then exactly one [`end_step`] call for it.
///
/// [`end_step`]: ActivationTracker::end_step
pub(crate) struct ActivationTracker {
    agents: HashMap<u64, AgentIntervals>,
    last_step: Option<TimeMS>,
}

impl ActivationTracker {
    pub(crate) fn new() -> Self {
        Self {
            agents: HashMap::new(),
            last_step: None,
        }
    }

    pub(crate) fn observe(&mut self, agent_id: u64, now: TimeMS) {
        let intervals = self
            .agents
            .entry(agent_id)
            .or_insert_with(AgentIntervals::new);
        if intervals.disrupted {
            intervals.on_times.push(now.as_u64());
            intervals.off_times.push(now.as_u64());
            intervals.disrupted = false;
        } else {
            let off_time = intervals
                .off_times
                .last_mut()
                .expect("continuous agent has no open interval");
            *off_time = now.as_u64();
        }
    }

    /// Closes the intervals of all vehicles that were not observed at the
    /// timestep that just ended.
    pub(crate) fn end_step(&mut self, now: TimeMS) {
        if let Some(last_step) = self.last_step {
            if now <= last_step {
                panic!(
                    "trace time steps must be strictly increasing: {} after {}",
                    now, last_step
                );
            }
        }
        self.last_step = Some(now);

        self.agents.values_mut().for_each(|intervals| {
            if intervals.disrupted {
                return;
            }
            let last_seen = *intervals
                .off_times
                .last()
                .expect("continuous agent has no open interval");
            if last_seen < now.as_u64() {
                intervals.disrupted = true;
            }
        });
    }

    pub(crate) fn unique_agents(&self) -> usize {
        self.agents.len()
    }

    /// Emits every interval, open or closed, ordered by agent id and then
    /// interval start.
    pub(crate) fn finalize(self) -> Vec<ActivationInfo> {
        let mut agent_ids: Vec<u64> = self.agents.keys().copied().collect();
        agent_ids.sort_unstable();

        let mut activations = Vec::new();
        for agent_id in agent_ids {
            let intervals = &self.agents[&agent_id];
            for (on_time, off_time) in intervals.on_times.iter().zip(intervals.off_times.iter()) {
                activations.push(
                    ActivationInfo::builder()
                        .agent_id(agent_id)
                        .ns3_id(agent_id)
                        .on_time(*on_time)
                        .off_time(*off_time)
                        .build(),
                );
            }
        }
        activations
    }
}

pub(crate) struct ActivationCache {
    agent_ids: Vec<u64>,
    ns3_ids: Vec<u64>,
    on_times: Vec<u64>,
    off_times: Vec<u64>,
    cache_limit: usize,
}

impl ActivationCache {
    pub(crate) fn new(cache_size: usize) -> Self {
        Self {
            agent_ids: Vec::with_capacity(cache_size),
            ns3_ids: Vec::with_capacity(cache_size),
            on_times: Vec::with_capacity(cache_size),
            off_times: Vec::with_capacity(cache_size),
            cache_limit: (cache_size * 90) / 100,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.agent_ids.len() >= self.cache_limit
    }

    pub(crate) fn append_activation(&mut self, activation_info: ActivationInfo) {
        self.agent_ids.push(activation_info.agent_id);
        self.ns3_ids.push(activation_info.ns3_id);
        self.on_times.push(activation_info.on_time);
        self.off_times.push(activation_info.off_time);
    }

    pub(crate) fn as_record_batch(&mut self) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                AGENT_ID,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.agent_ids))) as ArrayRef,
            ),
            (
                NS3_ID,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.ns3_ids))) as ArrayRef,
            ),
            (
                ON_TIMES,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.on_times))) as ArrayRef,
            ),
            (
                OFF_TIMES,
                Arc::new(UInt64Array::from(std::mem::take(&mut self.off_times))) as ArrayRef,
            ),
        ])
        .expect("Failed to convert activation cache to record batch")
    }
}

pub(crate) struct ActivationWriter {
    writer: WriterType,
    activations_cache: ActivationCache,
}

impl ResultWriter for ActivationWriter {
    fn schema() -> Schema {
        let agent_id = Field::new(AGENT_ID, DataType::UInt64, false);
        let ns3_id = Field::new(NS3_ID, DataType::UInt64, false);
        let on_time = Field::new(ON_TIMES, DataType::UInt64, false);
        let off_time = Field::new(OFF_TIMES, DataType::UInt64, false);
        Schema::new(vec![agent_id, ns3_id, on_time, off_time])
    }

    fn write_to_file(&mut self) {
        if self.activations_cache.is_full() {
            self.writer
                .record_batch_to_file(&self.activations_cache.as_record_batch());
        }
    }

    fn close_file(mut self) {
        debug!(r"Activation parsing is done. Flushing the cache to file");
        self.writer
            .record_batch_to_file(&self.activations_cache.as_record_batch());
        self.writer.close()
    }
}

impl ActivationWriter {
    pub(crate) fn new(trace_settings: &TraceSettings) -> Self {
        let activation_file = PathBuf::from(trace_settings.activation_file.to_owned());
        let writer = WriterType::new(&activation_file, Self::schema());
        let cache_size = 10000;
        Self {
            writer,
            activations_cache: ActivationCache::new(cache_size),
        }
    }

    pub(crate) fn write_activations(&mut self, activations: &[ActivationInfo]) {
        for activation in activations {
            self.activations_cache.append_activation(*activation);
            self.write_to_file();
        }
    }
}
