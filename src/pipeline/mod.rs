//! Pipeline stages for timing-sheet extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets a new
//! sheet layout be added as one schema or one state machine without touching
//! the stages around it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ segment / training ──▶ decode ──▶ validate ──▶ derive ──▶ assemble
//! (path)   (lines)   (windows / entries)   (records)   (drop bad)  (sectors)  (rank, write)
//! ```
//!
//! 1. [`input`]    — validate the path and sniff PDF vs text export
//! 2. [`text`]     — per-page line stream; pdfium runs in `spawn_blocking`
//!    because it is not async-safe
//! 3. [`segment`]  — fixed-offset windows for event sheets, driven by the
//!    field tables in [`schema`]
//! 4. [`training`] — line-classifying state machine for training sheets
//! 5. [`decode`]   — window or entry → typed `RiderRecord`
//! 6. [`validate`] — exclude non-finishers and boilerplate before ranking
//! 7. [`derive`]   — sectors and time-to-finish from splits
//! 8. [`rank`] / [`assemble`] — competition ranks, fixed columns, writers
//!
//! [`timing`] holds the duration type shared by every stage.

pub mod assemble;
pub mod decode;
pub mod derive;
pub mod input;
pub mod rank;
pub mod schema;
pub mod segment;
pub mod text;
pub mod timing;
pub mod training;
pub mod validate;
