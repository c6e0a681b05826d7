pub mod compression;
pub mod errors;
pub mod pipe;
pub mod stream;

mod driver;

pub use compression::buffer::{compress, decode, decompress, encode};
pub use compression::options::{Mode, Options, OptionsBuilder};
pub use compression::Direction;
pub use stream::{
    compress_stream, compress_stream_with_config, decompress_stream,
    decompress_stream_with_config, CodecStream, StreamConfig, StreamInput, StreamOutput,
    StreamState,
};
