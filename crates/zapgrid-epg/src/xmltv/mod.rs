//! XMLTV serialization of a finished schedule.

mod episode;
mod escape;
mod time;
mod writer;

pub use episode::{common as episode_common, dd_progid, xmltv_ns as episode_xmltv_ns};
pub use escape::escape_text;
pub use time::{format_air_date, format_xmltv_time};
pub use writer::{XmltvOptions, channel_id, render, resolve_end};
