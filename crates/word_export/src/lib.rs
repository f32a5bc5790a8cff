// Word export engine: tabular records -> DOCX, with configurable
// header/footer templates and placeholder-based custom templates.

pub mod config;
pub mod export;
pub mod layout;
pub mod record;
pub mod storage;
pub mod style;
pub mod template;
pub mod writer;

pub use config::TemplateConfig;
pub use export::{ExportArtifact, ExportOptions, Exporter};
pub use layout::{BodySpec, LayoutPlan};
pub use record::{CellValue, Record};
pub use storage::{DiskManager, LocalDisk, MemoryDisk, Storage};
pub use template::{PlaceholderMap, TemplateError};
pub use writer::{DocumentWriter, DocxWriter};
