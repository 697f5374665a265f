pub mod buffers;
pub mod line;

pub use buffers::{BufferError, BufferId, RxBuffer, RxBufferPair};
pub use line::{LineEvent, LineReceiver};
