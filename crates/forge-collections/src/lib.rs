pub mod array;
pub mod hashmap;
pub mod queue;
pub mod string;

pub use array::Array;
pub use hashmap::HashMap;
pub use queue::Queue;
pub use string::{ForgeString, StringBuilder, StringPool};
