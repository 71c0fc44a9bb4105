use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]

/**
 * Errors raised while partitioning a domain, configuring the engine, or
 * moving ghost data between processes. Partition and transport errors are
 * fatal to the computation; the engine never retries or recovers from them.
 */
pub enum Error {
    /// The domain extent on an axis is not a multiple of the maximum box size.
    UnevenDomain { axis: usize, extent: i64, box_size: i64 },
    /// The number of boxes is not a multiple of the number of processes.
    UnevenProcesses { num_boxes: usize, num_procs: usize },
    /// A box size or domain extent that is zero or negative.
    InvalidBoxSize { axis: usize, box_size: i64 },
    /// The transport failed to send or receive a message.
    Transport(io::Error),
    /// A peer hung up, or a channel to a helper thread was closed.
    Disconnected(String),
    /// A received message does not fit the buffer of its motion item.
    MessageSize { tag: i64, expected: usize, received: usize },
    /// A message envelope could not be encoded or decoded.
    Codec(String),
    /// An invalid configuration value.
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            UnevenDomain { axis, extent, box_size } => write!(
                fmt,
                "domain extent {} on axis {} is not divisible by the box size {}",
                extent, axis, box_size
            ),
            UnevenProcesses { num_boxes, num_procs } => write!(
                fmt,
                "{} boxes cannot be divided evenly among {} processes",
                num_boxes, num_procs
            ),
            InvalidBoxSize { axis, box_size } => {
                write!(fmt, "invalid box size {} on axis {}", box_size, axis)
            }
            Transport(e) => write!(fmt, "transport failure: {}", e),
            Disconnected(msg) => write!(fmt, "disconnected: {}", msg),
            MessageSize { tag, expected, received } => write!(
                fmt,
                "message with tag {} has {} bytes, expected {}",
                tag, received, expected
            ),
            Codec(msg) => write!(fmt, "message codec failure: {}", msg),
            Config(msg) => write!(fmt, "invalid configuration: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(e)
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Error::Disconnected("send on a closed channel".to_string())
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    fn from(e: crossbeam_channel::RecvError) -> Self {
        Error::Disconnected(e.to_string())
    }
}
