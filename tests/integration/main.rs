//! Integration tests for PROPLINE.
//!
//! Drives the full generate → settle → bankroll pipeline against a mock
//! board and an in-memory (or temp-file) workbook.

mod mock_board;
mod pipeline;
