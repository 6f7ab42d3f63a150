//! A small distributed MapReduce engine: one coordinator process
//! dispatches map and reduce tasks to transient worker processes, which
//! materialize intermediate and final output as local files.

pub mod mr;
