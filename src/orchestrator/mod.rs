//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责对存储写操作的分批调度。
//!
//! ### `batch_processor` - 分批处理器
//! - 把任意长度的创建 / 更新 / 删除列表切成每批最多 10 条
//! - 逐批顺序发送，前一批完成后才发送下一批
//! - 按批次顺序拼接创建结果
//!
//! ## 层次关系
//!
//! ```text
//! workflow::GenerationFlow / services::LibraryService
//!     ↓
//! services::StudyRepository
//!     ↓
//! orchestrator::BatchProcessor
//!     ↓
//! infrastructure::RecordStore
//! ```

pub mod batch_processor;

pub use batch_processor::{BatchProcessor, MAX_RECORDS_PER_REQUEST};
