//! Best-effort descriptive attributes for a client: browser, OS and device
//! from the `User-Agent` header, approximate location from the IP.
//!
//! Nothing here can fail a request; unknown inputs produce empty attributes.

pub mod geo;
pub mod user_agent;

pub use geo::{GeoLocation, GeoResolver, MaxMindGeo, NoGeo};
pub use user_agent::{parse_user_agent, UserAgentInfo};
