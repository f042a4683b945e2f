// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Memory usage monitoring. Currently only supported on Linux.

use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::*;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::map_res;
use nom::multi::count;
use nom::sequence::{terminated, tuple};
use nom::IResult;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Memory usage information processed from `/proc/[pid]/statm`.
///
/// All values are in units of pages.
///
/// See `man 5 proc` and `Linux/fs/proc/array.c`.
#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct Statm {
    /// Total virtual memory size.
    pub size: usize,
    /// Resident non-swapped memory.
    pub resident: usize,
    /// Shared memory.
    pub share: usize,
    /// Resident executable memory.
    pub text: usize,
    /// Resident data and stack memory.
    pub data: usize,
}

/// Samples the resident memory of the process in a background thread and
/// keeps the peak.
pub struct MemoryWatcher {
    init_resident: usize,
    max_resident: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for MemoryWatcher {
    fn default() -> Self {
        MemoryWatcher {
            init_resident: 0,
            max_resident: Arc::new(AtomicUsize::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl MemoryWatcher {
    /// Records the current resident memory, or zero if it is unavailable.
    pub fn new() -> Self {
        match statm_self() {
            Ok(statm) => MemoryWatcher {
                init_resident: statm.resident,
                ..MemoryWatcher::default()
            },
            Err(e) => {
                warn!("Unable to read the statm file: {}", e);
                MemoryWatcher::default()
            }
        }
    }

    pub fn start(&mut self) {
        let max_resident = self.max_resident.clone();
        let stop = self.stop.clone();
        self.handle = Some(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if let Ok(statm) = statm_self() {
                    max_resident.fetch_max(statm.resident, Ordering::Relaxed);
                }
                thread::sleep(SAMPLE_INTERVAL);
            }
        }));
    }

    /// Stops sampling and reports the memory usage.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("The memory watcher thread panicked");
            }
        }
        info!("Used Memory Before Analysis: {} MB", pages_in_megabytes(self.init_resident));
        info!(
            "Max Memory in Analysis: {} MB",
            pages_in_megabytes(self.max_resident())
        );
    }

    /// Peak resident memory seen so far, in pages.
    pub fn max_resident(&self) -> usize {
        self.max_resident.load(Ordering::Relaxed)
    }
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}

fn pages_in_megabytes(pages: usize) -> usize {
    pages * page_size() / 1024 / 1024
}

/// Transforms a `nom` parse result into a io result.
/// The parser must completely consume the input.
fn map_result<T>(result: IResult<&str, T>) -> Result<T> {
    match result {
        Ok(("", val)) => Ok(val),
        Ok((remaining, _)) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unable to parse whole input, remaining: {:?}", remaining),
        )),
        Err(err) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("unable to parse input: {:?}", err),
        )),
    }
}

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

/// Parses the statm file format.
///
/// The columns in the statm file include: size resident shared text lib data dt
fn parse_statm(input: &str) -> IResult<&str, Statm> {
    tuple((count(terminated(parse_usize, tag(" ")), 6), parse_usize))(input).map(|(next_input, res)| {
        let statm = Statm {
            size: res.0[0],
            resident: res.0[1],
            share: res.0[2],
            text: res.0[3],
            data: res.0[5],
        };
        (next_input, statm)
    })
}

/// Returns memory status information for the current process.
pub fn statm_self() -> Result<Statm> {
    let buf = fs::read_to_string("/proc/self/statm")?;
    map_result(parse_statm(buf.trim()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_statm_line() {
        let statm = map_result(parse_statm("1000 200 30 4 0 50 0")).unwrap();
        assert_eq!(
            statm,
            Statm {
                size: 1000,
                resident: 200,
                share: 30,
                text: 4,
                data: 50
            }
        );
        assert!(map_result(parse_statm("1 2 3")).is_err());
        assert!(map_result(parse_statm("1 2 3 4 5 6 7 8")).is_err());
    }
}
