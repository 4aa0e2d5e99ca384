//! The generic attribute model used at the engine boundary.

mod access;
mod error;
mod value;

pub use access::{
    check_entity_type, format_timestamp, get_datetime, get_optional_datetime,
    get_optional_string, get_string, parse_timestamp, put_datetime, put_optional_string,
    put_string,
};
pub use error::ItemError;
pub use value::{AttributeValue, Item};
