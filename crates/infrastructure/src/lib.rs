//! 基础设施实现。
//!
//! 持久层的进程内实现：按 id 的扁平集合（users、messages、statuses、
//! deleted_ids、uploads），与外部文档存储同构，供测试与单机部署使用。

pub mod memory;

pub use memory::MemoryStore;
