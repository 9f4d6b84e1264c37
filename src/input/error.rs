//! Input Delivery Error Types
//!
//! Errors that escape the delivery subsystem to the caller of
//! [`InputSender::deliver`](super::InputSender::deliver). Transient delivery
//! failures (back-pressure, dead peers, timeouts, surface teardown) are not
//! errors at this level: they are reported to the
//! [`InputSendObserver`](super::InputSendObserver) and the event is dropped.

use thiserror::Error;

use super::channel::ChannelId;

/// Result type for input delivery operations
pub type Result<T> = std::result::Result<T, InputSendError>;

/// Input delivery error types
#[derive(Error, Debug)]
pub enum InputSendError {
    /// The producer addressed a channel with no live transfer
    #[error("Failure sending input event: unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// The transport failed in a way that cannot be recovered locally
    #[error("Failure sending input event on channel {channel}: {source}")]
    Transport {
        /// Channel the publish was attempted on
        channel: ChannelId,
        /// Underlying transport error
        #[source]
        source: std::io::Error,
    },
}

/// Error classification for caller-side handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The caller addressed something that does not exist; do not retry
    Caller,
    /// The transport is broken; the channel should be considered unusable
    Transport,
}

/// Classify error for recovery strategy selection
pub fn classify_error(error: &InputSendError) -> ErrorType {
    match error {
        InputSendError::UnknownChannel(_) => ErrorType::Caller,
        InputSendError::Transport { .. } => ErrorType::Transport,
    }
}

impl InputSendError {
    /// Channel the failed operation targeted
    pub fn channel(&self) -> ChannelId {
        match self {
            InputSendError::UnknownChannel(channel) => *channel,
            InputSendError::Transport { channel, .. } => *channel,
        }
    }

    /// Raw OS error code of a transport failure, if there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            InputSendError::Transport { source, .. } => source.raw_os_error(),
            InputSendError::UnknownChannel(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = InputSendError::UnknownChannel(ChannelId::new(42));
        assert_eq!(
            error.to_string(),
            "Failure sending input event: unknown channel fd:42"
        );

        let error = InputSendError::Transport {
            channel: ChannelId::new(7),
            source: std::io::Error::from_raw_os_error(libc_ebadf()),
        };
        assert!(error.to_string().contains("channel fd:7"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_classification() {
        let error = InputSendError::UnknownChannel(ChannelId::new(3));
        assert_eq!(classify_error(&error), ErrorType::Caller);
        assert_eq!(error.channel(), ChannelId::new(3));
        assert_eq!(error.raw_os_error(), None);

        let error = InputSendError::Transport {
            channel: ChannelId::new(4),
            source: std::io::Error::from_raw_os_error(libc_ebadf()),
        };
        assert_eq!(classify_error(&error), ErrorType::Transport);
        assert_eq!(error.raw_os_error(), Some(libc_ebadf()));
    }

    fn libc_ebadf() -> i32 {
        nix::errno::Errno::EBADF as i32
    }
}
