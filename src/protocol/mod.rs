//! Decoded reply values.
//!
//! The wire codec lives outside this crate; everything here works on replies
//! that have already been decoded into [`RespValue`].

mod scan;
mod value;

pub use scan::parse_scan_response;
pub use value::RespValue;
