//! Shared test harness modules for the floodmosaic CLI.

use super::*;

mod helpers;
