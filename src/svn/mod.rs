pub mod dump;
pub mod emit;
pub mod props;
pub mod reader;
pub mod source;
