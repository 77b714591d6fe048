// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All constants *must* be double precision.

/// A key whose deviation is more than this many times the median deviation is bad.
pub const BAD_DEVIATION_RATIO: f64 = 5.0;

/// A key whose deviation is more than this many times the median deviation (but not
/// more than [`BAD_DEVIATION_RATIO`]) is borderline.
pub const BORDERLINE_DEVIATION_RATIO: f64 = 3.0;

/// Default fraction of an antenna's baselines which must be bad before the whole
/// antenna is considered bad.
pub const DEFAULT_BAD_ANTENNA_FRACTION: f64 = 0.5;

/// Closure phases (radians) smaller than this are treated as exactly closed.
pub const CLOSURE_PHASE_TOLERANCE: f64 = 1e-9;
