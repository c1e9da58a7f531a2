pub mod collection_ext;
pub mod error;
pub mod string_ext;

pub use collection_ext::{group_by, unique_ordered, unique_ordered_by};
pub use error::{ApiError, ApiResult};
pub use string_ext::{clean_optional_string, object_particle, topic_particle, StringExt};
