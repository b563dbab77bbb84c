pub mod unflatten;
pub mod value;

pub use unflatten::unflatten_params;
pub use value::{DictMap, DictValue};
