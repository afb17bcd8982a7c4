pub mod clock;
pub mod params;
pub mod xml;

pub use clock::parse_clock;
pub use params::{
    parse_device_identity, parse_ir_cut_filter, parse_ptz_limits, parse_ptz_position,
    parse_temperature, ParamList,
};
pub use xml::{parse_device_identity_xml, parse_geolocation};
