pub mod wkt;

pub use self::wkt::{Ingested, corrected_wkt, ingest_lines, parse_network, write_network};
