pub mod request_meta;

pub use request_meta::{request_meta, REQUEST_ID_HEADER};
