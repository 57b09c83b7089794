//! Shared test harness modules for the Kartlag CLI.

use super::*;

mod helpers;
mod pipeline;
