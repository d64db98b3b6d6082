use serde::{Deserialize, Serialize};

use crate::value_objects::UploadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Uploading,
    Completed,
}

/// 分块上传的进度记录。字节流本身由外部边界处理，核心只跟踪进度。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub file_name: String,
    pub total_size: u64,
    pub current_size: u64,
    pub state: UploadState,
}

impl Upload {
    pub fn begin(id: UploadId, file_name: impl Into<String>, total_size: u64) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            total_size,
            current_size: 0,
            state: UploadState::Uploading,
        }
    }

    /// 记录一个到达的分块；累计字节达到总大小时标记完成。
    pub fn record_chunk(&mut self, len: u64) {
        self.current_size += len;
        if self.current_size >= self.total_size {
            self.state = UploadState::Completed;
        }
    }
}
