// MIT License
//
// Copyright (c) 2026 The stripemap Developers
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Error types for table growth and configuration.

use thiserror::Error;

/// Result type alias for fallible table operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for operations that grow or configure a table.
///
/// Missing keys on reads and removals are not errors; those operations
/// return the caller-supplied default or report a no-op instead.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A rehash target exceeded the largest representable bucket count.
    #[error("requested bucket count {requested} exceeds the supported table size")]
    CapacityExceeded {
        /// The bucket count that was asked for.
        requested: usize,
    },

    /// A maximum load factor was not a positive finite number.
    #[error("max load factor must be a positive finite number, got {0}")]
    InvalidMaxLoadFactor(f64),
}
