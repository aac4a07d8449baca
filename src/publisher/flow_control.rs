//! Flow control for outstanding messages
//!
//! A message is outstanding from the moment `publish` accepts it until the
//! batch carrying it has resolved. The controller bounds how many messages and
//! bytes may be outstanding at once; what happens past the limit depends on
//! `LimitExceededBehavior`.

use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

use crate::config::{FlowControlSettings, LimitExceededBehavior};
use crate::utils::error::FlowControlError;

#[derive(Debug, Default)]
struct Outstanding {
    messages: usize,
    bytes: usize,
}

#[derive(Debug)]
pub struct FlowController {
    message_limit: usize,
    byte_limit: usize,
    behavior: LimitExceededBehavior,
    outstanding: Mutex<Outstanding>,
    released: Notify,
}

impl FlowController {
    pub fn new(settings: &FlowControlSettings) -> Self {
        Self {
            message_limit: settings.message_limit,
            byte_limit: settings.byte_limit,
            behavior: settings.limit_exceeded_behavior,
            outstanding: Mutex::new(Outstanding::default()),
            released: Notify::new(),
        }
    }

    pub fn message_limit(&self) -> usize {
        self.message_limit
    }

    pub fn byte_limit(&self) -> usize {
        self.byte_limit
    }

    pub fn limit_exceeded_behavior(&self) -> LimitExceededBehavior {
        self.behavior
    }

    /// Current outstanding `(messages, bytes)`.
    pub fn outstanding(&self) -> (usize, usize) {
        let outstanding = self.lock();
        (outstanding.messages, outstanding.bytes)
    }

    /// Reserves room for one message of `bytes` bytes.
    pub async fn acquire(&self, bytes: usize) -> Result<(), FlowControlError> {
        match self.behavior {
            LimitExceededBehavior::Ignore => Ok(()),
            LimitExceededBehavior::Error => {
                let mut outstanding = self.lock();
                if !self.fits(&outstanding, bytes) {
                    return Err(self.exceeded(&outstanding, bytes));
                }
                outstanding.messages += 1;
                outstanding.bytes += bytes;
                Ok(())
            }
            LimitExceededBehavior::Block => {
                if self.message_limit == 0 || bytes > self.byte_limit {
                    // No amount of releasing would make room
                    return Err(self.exceeded(&Outstanding::default(), bytes));
                }
                loop {
                    let released = self.released.notified();
                    tokio::pin!(released);
                    released.as_mut().enable();
                    {
                        let mut outstanding = self.lock();
                        if self.fits(&outstanding, bytes) {
                            outstanding.messages += 1;
                            outstanding.bytes += bytes;
                            return Ok(());
                        }
                        debug!(
                            messages = outstanding.messages,
                            bytes = outstanding.bytes,
                            "flow control limit reached, waiting for release"
                        );
                    }
                    released.await;
                }
            }
        }
    }

    /// Returns capacity taken by `messages` messages totalling `bytes` bytes.
    pub fn release(&self, messages: usize, bytes: usize) -> Result<(), FlowControlError> {
        if self.behavior == LimitExceededBehavior::Ignore {
            return Ok(());
        }
        {
            let mut outstanding = self.lock();
            if messages > outstanding.messages || bytes > outstanding.bytes {
                return Err(FlowControlError::ReleaseUnderflow { messages, bytes });
            }
            outstanding.messages -= messages;
            outstanding.bytes -= bytes;
        }
        self.released.notify_waiters();
        Ok(())
    }

    fn fits(&self, outstanding: &Outstanding, bytes: usize) -> bool {
        outstanding.messages < self.message_limit
            && outstanding.bytes + bytes <= self.byte_limit
    }

    fn exceeded(&self, outstanding: &Outstanding, bytes: usize) -> FlowControlError {
        FlowControlError::LimitExceeded {
            messages: outstanding.messages + 1,
            bytes: outstanding.bytes + bytes,
            message_limit: self.message_limit,
            byte_limit: self.byte_limit,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Outstanding> {
        // Counters stay consistent even if a holder panicked
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
