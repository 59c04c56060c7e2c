//! Frame sources.
//!
//! Decoding video is out of scope for the engine; sources hand it already
//! decoded RGB frames. Supported inputs:
//! - a single image file (JPEG or PNG)
//! - a directory of image files, read in file-name order
//! - `stub://WIDTHxHEIGHT?frames=N`, blank synthetic frames for tests and demos
//!
//! Sources only read local paths. They never write frames anywhere.

pub mod file;

pub use file::{FileConfig, FileSource, FileStats};
