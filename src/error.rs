// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;

/// Returned when a producer-facing operation is attempted on a [`crate::Timer`]
/// that has not been started, or has been [`stop`](crate::Timer::stop)ped.
///
/// This is the only error the public surface of this crate ever returns at
/// runtime; invalid constructor options are programmer error and panic
/// instead (see [`crate::Options`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Closed(pub(crate) ());

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("timer is closed")
    }
}

impl std::error::Error for Closed {}
