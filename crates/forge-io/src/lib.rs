pub mod line_reader;
pub mod reader;
pub mod writer;

pub use line_reader::{LineReader, NewlineMode, read_all_lines};
pub use reader::{CompositeReader, LimitedReader, MemoryReader, Reader};
pub use writer::{MemoryWriter, Writer};
