use crate::compression::Direction;

error_chain::error_chain! {
    foreign_links {
        IoError(std::io::Error);
    }

    errors {
        // Rejected before any engine work started.
        Config(key: String, reason: String) {
            description("invalid option")
            display("invalid option `{}`: {}", key, reason)
        }
        Codec(detail: String) {
            description("codec failure")
            display("{}", detail)
        }
        Closed {
            description("stream closed")
            display("operation on a closed stream")
        }
    }
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config(..))
    }

    pub fn is_codec(&self) -> bool {
        matches!(self.kind(), ErrorKind::Codec(..))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.kind(), ErrorKind::Closed)
    }

    /// Builds an equivalent error for a second observer of the same failure, e.g. the pending
    /// flush of a stream whose consumer also receives the error.
    pub(crate) fn replicate(&self) -> Error {
        match self.kind() {
            ErrorKind::Config(key, reason) => ErrorKind::Config(key.clone(), reason.clone()).into(),
            ErrorKind::Codec(detail) => ErrorKind::Codec(detail.clone()).into(),
            ErrorKind::Closed => ErrorKind::Closed.into(),
            _ => ErrorKind::Codec(self.to_string()).into(),
        }
    }
}

pub(crate) fn config_error(key: &str, reason: impl Into<String>) -> Error {
    ErrorKind::Config(key.to_string(), reason.into()).into()
}

pub(crate) fn closed_error() -> Error {
    ErrorKind::Closed.into()
}

/// Translates a failure reported by the engine while working in `direction`.
pub(crate) fn engine_error(direction: Direction, err: std::io::Error) -> Error {
    let detail = match (direction, err.kind()) {
        // a finished decoder accepts no more bytes
        (Direction::Decompress, std::io::ErrorKind::WriteZero) => {
            "unexpected data after end of stream".to_string()
        }
        _ => err.to_string(),
    };
    ErrorKind::Codec(format!("brotli failed to {}: {}", direction.verb(), detail)).into()
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err.kind() {
            ErrorKind::Config(..) => std::io::ErrorKind::InvalidInput,
            ErrorKind::Codec(..) => std::io::ErrorKind::InvalidData,
            ErrorKind::Closed => std::io::ErrorKind::BrokenPipe,
            ErrorKind::IoError(e) => e.kind(),
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err.to_string())
    }
}
