// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Logging shims. With the `log` feature on, these are the [`log`] crate
//! macros under crate-local names; without it, they compile to nothing.

#[cfg(feature = "log")]
pub(crate) use log::{debug as log_debug, error as log_error, warn as log_warn};

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ( $($args:tt)* ) => {
        ()
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_error {
    ( $($args:tt)* ) => {
        ()
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ( $($args:tt)* ) => {
        ()
    };
}

#[cfg(not(feature = "log"))]
pub(crate) use log_debug;
#[cfg(not(feature = "log"))]
pub(crate) use log_error;
#[cfg(not(feature = "log"))]
pub(crate) use log_warn;
