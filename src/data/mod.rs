/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 数据加载---(输入, 目标) 像素张量的分批供给
 *
 * 提供训练/验证两个切分的统一迭代API，支持：
 * - 自动分批 (batch_size)
 * - 随机打乱 (shuffle)，可固定种子保证可复现
 * - 丢弃不完整批次 (drop_last)
 * - reset(split) 回卷到切分开头
 */

use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;


/// 持有成对 (输入, 目标) 像素张量的数据集，第一维为样本数
#[derive(Clone)]
pub struct PairedDataset {
    inputs: Tensor,
    targets: Tensor,
    len: usize,
}

impl PairedDataset {
    /// # Panics
    /// inputs 和 targets 的样本数不一致时panic
    pub fn new(inputs: Tensor, targets: Tensor) -> Self {
        let len = inputs.shape()[0];
        assert_eq!(
            len,
            targets.shape()[0],
            "PairedDataset: inputs 和 targets 的样本数必须一致，得到 {} vs {}",
            len,
            targets.shape()[0]
        );
        Self {
            inputs,
            targets,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    pub fn targets(&self) -> &Tensor {
        &self.targets
    }

    /// 按样本索引收集一个批次
    fn gather(&self, indices: &[usize]) -> (Tensor, Tensor) {
        (
            gather_rows(&self.inputs, indices),
            gather_rows(&self.targets, indices),
        )
    }
}

fn gather_rows(tensor: &Tensor, indices: &[usize]) -> Tensor {
    let shape = tensor.shape();
    let sample_size: usize = shape[1..].iter().product();
    let values = tensor.to_vec();
    let mut out = Vec::with_capacity(indices.len() * sample_size);
    for &i in indices {
        out.extend_from_slice(&values[i * sample_size..(i + 1) * sample_size]);
    }
    let mut out_shape = shape.to_vec();
    out_shape[0] = indices.len();
    Tensor::new(&out, &out_shape)
}

/// 数据切分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

struct SplitState {
    order: Vec<usize>,
    cursor: usize,
}

/// 训练/验证双切分的批量加载器
///
/// # 示例
/// ```ignore
/// let mut loader = SplitLoader::new(train_set, val_set, 4)
///     .shuffle(true)
///     .drop_last(true)
///     .with_seed(42);
/// while let Some((x, y)) = loader.next_batch(Split::Train) {
///     let loss = criterion.evaluate(&x, &EvalTargets { content_target: Some(&y), ..Default::default() })?;
/// }
/// loader.reset(Split::Train);
/// ```
pub struct SplitLoader {
    train: PairedDataset,
    val: PairedDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
    train_state: SplitState,
    val_state: SplitState,
}

impl SplitLoader {
    /// # Panics
    /// batch_size为0时panic
    pub fn new(train: PairedDataset, val: PairedDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "SplitLoader: batch_size必须大于0");
        let train_state = SplitState {
            order: (0..train.len()).collect(),
            cursor: 0,
        };
        let val_state = SplitState {
            order: (0..val.len()).collect(),
            cursor: 0,
        };
        Self {
            train,
            val,
            batch_size,
            shuffle: false,
            drop_last: false,
            seed: None,
            train_state,
            val_state,
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self.reset(Split::Train);
        self.reset(Split::Val);
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// 固定打乱种子（可复现）；每次reset都会重新以该种子打乱
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.reset(Split::Train);
        self.reset(Split::Val);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 每个epoch的批次数
    pub fn batches_per_epoch(&self, split: Split) -> usize {
        let len = self.dataset(split).len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }

    fn dataset(&self, split: Split) -> &PairedDataset {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
        }
    }

    /// 回卷指定切分：游标清零并（若开启）重新打乱顺序
    pub fn reset(&mut self, split: Split) {
        let (len, shuffle, seed) = (self.dataset(split).len(), self.shuffle, self.seed);
        let state = match split {
            Split::Train => &mut self.train_state,
            Split::Val => &mut self.val_state,
        };
        state.order = (0..len).collect();
        state.cursor = 0;
        if shuffle {
            match seed {
                Some(seed) => state.order.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => state.order.shuffle(&mut rand::thread_rng()),
            }
        }
    }

    /// 取下一个 (输入, 目标) 批次；切分耗尽时返回None（需reset后再迭代）
    pub fn next_batch(&mut self, split: Split) -> Option<(Tensor, Tensor)> {
        let state = match split {
            Split::Train => &self.train_state,
            Split::Val => &self.val_state,
        };
        let remaining = state.order.len() - state.cursor;
        if remaining == 0 || (self.drop_last && remaining < self.batch_size) {
            return None;
        }
        let take = remaining.min(self.batch_size);
        let indices = state.order[state.cursor..state.cursor + take].to_vec();

        match split {
            Split::Train => self.train_state.cursor += take,
            Split::Val => self.val_state.cursor += take,
        }
        Some(self.dataset(split).gather(&indices))
    }
}
