//! Structured question answering over the supply table.

pub mod existence;
pub mod extract;
pub mod render;
pub mod resolver;

pub use existence::{existence_fragment, ExistenceAnswer, ExistenceChecker};
pub use extract::{extract, Constraint, ExtractionRule, RULES};
pub use render::{render_rows, to_record_batch, DISPLAY_COLUMNS};
pub use resolver::{answer_structured, Answer, RowFilter, StructuredResolver, DEFAULT_ACCEPT_ABOVE};
