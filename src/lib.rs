// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

#![allow(
    clippy::single_match,
    clippy::needless_lifetimes,
    clippy::needless_return,
    clippy::len_zero
)]

pub mod error;
pub mod graph;
pub mod ir;
pub mod pta;
pub mod pts_set;
pub mod util;

pub use error::{Error, Result};
