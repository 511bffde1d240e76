use crate::nn::CriterionConfig;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// 训练状态检查点：步数 + 判据配置 + 命名参数张量，整体bincode到单个文件。
/// 核心不解释其内容，训练循环自行决定存取哪些张量。
#[derive(Serialize, Deserialize)]
pub struct TrainState {
    pub step: u64,
    pub config: serde_json::Value,
    pub tensors: Vec<(String, Tensor)>,
}

impl TrainState {
    pub fn new(step: u64, config: &CriterionConfig) -> std::io::Result<Self> {
        let config = serde_json::to_value(config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            step,
            config,
            tensors: Vec::new(),
        })
    }

    pub fn criterion_config(&self) -> std::io::Result<CriterionConfig> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let serialized = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        File::create(path)?.write_all(&serialized)
    }

    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut serialized = Vec::new();
        File::open(path)?.read_to_end(&mut serialized)?;
        bincode::deserialize(&serialized)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
