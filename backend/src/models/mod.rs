pub mod envelope;
pub mod value;

pub use envelope::{
    BlockData, BlockResult, BlockResultKind, ChartKind, ChartSeries, ChartSpec, ChatResponse,
    ResponseStatus,
};
pub use value::{parse_lenient_number, RowTable, Value};
