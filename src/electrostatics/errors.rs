/* ************************************************************************ **
** This file is part of mpole, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of mpole is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

/// A fixed-size quantity differs from what the context was built for.
#[derive(Debug, Fail)]
#[fail(display = "{}", message)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self
    { ConfigError { message: message.into() } }
}

/// Covalent information no longer agrees with the exclusion tiles.
#[derive(Debug, Fail)]
#[fail(display = "topology changed after initialization: {}", message)]
pub struct TopologyChangedError {
    pub message: String,
}

/// A feature was requested that the context was specialized to omit.
#[derive(Debug, Fail)]
#[fail(display = "Cannot set a non-zero quadrupole moment, because quadrupoles were excluded from the kernel")]
pub struct UnsupportedToggleError;
