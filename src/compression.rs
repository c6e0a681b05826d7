pub mod buffer;
pub mod mode;
pub mod options;
pub mod session;

/// Which way a codec session transforms its input.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Direction {
    Compress,
    Decompress,
}

impl Direction {
    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Direction::Compress => "compress",
            Direction::Decompress => "decompress",
        }
    }
}
