//! Scoped ownership of the board reset line

use core::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::programmer::{LineLevel, OutputControl};

/// Holds the reset line low for as long as it lives
///
/// Dereferences to the programmer, so all SPI traffic of a session goes
/// through the hold. The line is released exactly once: by [`release`],
/// which reports failures, or on drop, which can only log them.
///
/// [`release`]: ResetHold::release
pub struct ResetHold<'a, M: OutputControl + ?Sized> {
    master: &'a mut M,
    line: u8,
    released: bool,
}

impl<'a, M: OutputControl + ?Sized> ResetHold<'a, M> {
    /// Drive `line` low and return the guard
    ///
    /// If driving the line fails it is released again before the error is
    /// returned.
    pub fn assert(master: &'a mut M, line: u8) -> Result<Self> {
        log::debug!("Asserting reset line {}", line);
        if let Err(e) = master.set_output(line, LineLevel::Low) {
            if let Err(e) = master.set_output(line, LineLevel::Released) {
                log::warn!("Failed to release reset line {}: {}", line, e);
            }
            return Err(e);
        }
        Ok(Self {
            master,
            line,
            released: false,
        })
    }

    /// The line this guard holds
    pub fn line(&self) -> u8 {
        self.line
    }

    /// Release the line and report the result
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        log::debug!("Releasing reset line {}", self.line);
        self.master.set_output(self.line, LineLevel::Released)
    }
}

impl<M: OutputControl + ?Sized> Deref for ResetHold<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.master
    }
}

impl<M: OutputControl + ?Sized> DerefMut for ResetHold<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.master
    }
}

impl<M: OutputControl + ?Sized> Drop for ResetHold<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.master.set_output(self.line, LineLevel::Released) {
            log::error!("Failed to release reset line {}: {}", self.line, e);
        }
    }
}
