//! Command-line front ends for the voxsim similarity index

pub mod output;
