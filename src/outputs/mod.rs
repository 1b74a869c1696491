//! CSV outputs of the collection and merge stages.
//!
//! # Submodules
//!
//! - [`parts`]: one part file per (keyword, quarter) pair, plus the CSV codec
//!   shared with the merged file
//! - [`merge`]: reads every part file and writes the deduplicated dataset
//!
//! # Output Structure
//!
//! ```text
//! output_parts/
//! ├── 청도군_2022_Q1.csv
//! ├── 청도군_2022_Q2.csv
//! └── 경북시민재단_2022_Q1.csv
//!
//! output/
//! └── news_merged.csv
//! ```

pub mod merge;
pub mod parts;
