//! Canonical column names shared by every table the producers read or write.

pub const TIME_STEP: &str = "time_step";
pub const AGENT_ID: &str = "agent_id";
pub const COORD_X: &str = "x";
pub const COORD_Y: &str = "y";
pub const VELOCITY: &str = "velocity";
pub const ROAD_DATA: &str = "road_data";
pub const VEH_TYPE: &str = "veh_type";

pub const NS3_ID: &str = "ns3_id";
pub const ON_TIMES: &str = "on_times";
pub const OFF_TIMES: &str = "off_times";

pub const TARGET_ID: &str = "target_id";
pub const DISTANCE: &str = "distance";
