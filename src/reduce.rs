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

//! Common reducers for [`map_reduce`](crate::HashMap::map_reduce).

use std::ops::AddAssign;

/// Adds `value` to the accumulator.
pub fn sum<T: AddAssign>(accumulator: &mut T, value: T) {
    *accumulator += value;
}

/// Keeps the larger of the accumulator and `value`.
pub fn max<T: PartialOrd>(accumulator: &mut T, value: T) {
    if *accumulator < value {
        *accumulator = value;
    }
}

/// Keeps the smaller of the accumulator and `value`.
pub fn min<T: PartialOrd>(accumulator: &mut T, value: T) {
    if *accumulator > value {
        *accumulator = value;
    }
}
