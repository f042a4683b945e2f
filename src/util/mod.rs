// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fs::File;
use std::io::{BufWriter, Write};

pub mod bit_vec;
pub mod call_graph_stat;
pub mod chunked_queue;
pub mod mem_watcher;
pub mod options;
pub mod pta_statistics;
pub mod results_dumper;

/// Declares a `u32` newtype index usable as a points-to set element and as
/// a serialized id in program files.
#[macro_export]
macro_rules! index_type {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $name(u32);

        impl $crate::util::bit_vec::Idx for $name {
            #[inline]
            fn new(idx: usize) -> Self {
                assert!(idx <= u32::MAX as usize);
                $name(idx as u32)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

/// Opens a buffered writer for an output path. `stdout` writes to the
/// standard output.
pub fn output_writer(path: &str) -> std::io::Result<BufWriter<Box<dyn Write>>> {
    let writer = match path {
        "stdout" => Box::new(std::io::stdout()) as Box<dyn Write>,
        _ => Box::new(File::create(path)?) as Box<dyn Write>,
    };
    Ok(BufWriter::new(writer))
}
